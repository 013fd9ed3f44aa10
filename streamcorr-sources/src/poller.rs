//! HTTP polling loop shared by both upstream sides.
//!
//! One [`SourcePoller`] owns the `reqwest::Client`, the polling cadence, and the
//! transport-error swallow-and-retry behavior. It is parameterized over an [`Extractor`] so
//! the two upstream formats share a single polling implementation.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::extractor::Extractor;
use crate::{Observation, Side};

/// Configuration for a single source poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Full URL to poll, e.g. `http://localhost:7299/source/a`.
    pub url: String,
    /// Delay between successful polls.
    pub poll_interval: Duration,
    /// Delay before retrying after a transport error.
    pub retry_delay: Duration,
}

/// Polls one upstream side, applying `extractor` to each response, and forwards observed
/// identities on `tx`. Returns when the extractor reports its end-of-stream sentinel or when
/// `cancel` is triggered.
pub struct SourcePoller<E: Extractor> {
    client: reqwest::Client,
    config: PollerConfig,
    side: Side,
    extractor: E,
}

impl<E: Extractor> SourcePoller<E> {
    pub fn new(client: reqwest::Client, config: PollerConfig, side: Side, extractor: E) -> Self {
        Self {
            client,
            config,
            side,
            extractor,
        }
    }

    /// Runs the poll loop until end-of-stream or cancellation, sending each observed identity
    /// on `tx`. The channel send is the only backpressure point: a full channel makes this
    /// poller wait before fetching the next batch.
    pub async fn run(self, tx: mpsc::Sender<Observation>, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                debug!(side = %self.side, "poller cancelled");
                return;
            }

            let body = tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.client.get(&self.config.url).send() => result,
            };

            let text = match body {
                Ok(response) => match response.text().await {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(side = %self.side, error = %err, "upstream transport error reading body");
                        sleep_or_cancel(self.config.retry_delay, &cancel).await;
                        continue;
                    }
                },
                Err(err) => {
                    warn!(side = %self.side, error = %err, "upstream transport error");
                    sleep_or_cancel(self.config.retry_delay, &cancel).await;
                    continue;
                }
            };

            let outcome = self.extractor.extract(&text);

            if outcome.malformed {
                warn!(side = %self.side, "dropped malformed upstream payload");
            }

            for id in outcome.identities {
                let obs = Observation { side: self.side, id };
                if tx.send(obs).await.is_err() {
                    // Receiver gone: correlator shut down, nothing left to do.
                    return;
                }
            }

            if outcome.end_of_stream {
                debug!(side = %self.side, "upstream end sentinel reached");
                return;
            }

            sleep_or_cancel(self.config.poll_interval, &cancel).await;
        }
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = cancel.cancelled() => {}
    }
}

/// Spawns a source poller as its own task, returning the join handle and the observation
/// receiver.
pub fn spawn<E: Extractor + 'static>(
    client: reqwest::Client,
    config: PollerConfig,
    side: Side,
    extractor: E,
    channel_capacity: usize,
    cancel: CancellationToken,
) -> (tokio::task::JoinHandle<()>, mpsc::Receiver<Observation>) {
    let (tx, rx) = mpsc::channel(channel_capacity);
    let poller = SourcePoller::new(client, config, side, extractor);
    let handle = tokio::spawn(async move { poller.run(tx, cancel).await });
    (handle, rx)
}
