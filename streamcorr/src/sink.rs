// streamcorr: Sink submitter (C6) — retrying HTTP delivery of classifications.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::{mpsc, Semaphore};
use tracing::warn;

use crate::classification::Classification;

/// The sink's transient back-pressure status. The spec describes this as "the HTTP
/// 406-equivalent condition" — this implementation treats literal HTTP 406 as that signal.
const BACKPRESSURE_STATUS: StatusCode = StatusCode::NOT_ACCEPTABLE;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts, total (including the first).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Backoff multiplier applied after each retry.
    pub multiplier: f64,
    /// Ceiling on backoff delay, regardless of how many retries remain.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Delivers classifications to the sink with bounded retry, backoff, and a concurrency cap
/// shared across every submission (the natural backpressure point when the sink is slow).
pub struct SinkSubmitter {
    client: reqwest::Client,
    url: String,
    retry: RetryConfig,
    inflight: Arc<Semaphore>,
}

/// Outcome of one logical delivery attempt, used by tests and by the lifecycle coordinator to
/// decide the exit code after the terminal drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Exhausted,
}

impl SinkSubmitter {
    pub fn new(client: reqwest::Client, url: String, retry: RetryConfig, concurrency: usize) -> Self {
        Self {
            client,
            url,
            retry,
            inflight: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Submits one classification. On any transport failure, or on the sink's back-pressure
    /// response, retries with exponential backoff up to `max_retries` total attempts. Logs and
    /// returns `Exhausted` rather than propagating the failure — per the error taxonomy, a
    /// dropped classification is a localized failure, not a pipeline fault.
    pub async fn submit(&self, classification: Classification) -> Delivery {
        // Acquiring before the retry loop (rather than per attempt) bounds how many logical
        // deliveries are in flight at once, not how many HTTP attempts are in flight.
        let _permit = self
            .inflight
            .acquire()
            .await
            .expect("sink concurrency semaphore never closed");

        let mut delay = self.retry.initial_delay;

        for attempt in 1..=self.retry.max_retries {
            match self.attempt(&classification).await {
                Ok(()) => return Delivery::Delivered,
                Err(reason) => {
                    if attempt == self.retry.max_retries {
                        warn!(
                            id = %classification.id,
                            kind = ?classification.kind,
                            attempts = attempt,
                            reason = %reason,
                            "sink retries exhausted, dropping classification",
                        );
                        return Delivery::Exhausted;
                    }
                    tokio::time::sleep(delay).await;
                    delay = Duration::from_secs_f64((delay.as_secs_f64() * self.retry.multiplier).min(self.retry.max_delay.as_secs_f64()));
                }
            }
        }

        unreachable!("max_retries is always >= 1, so the loop above always returns")
    }

    async fn attempt(&self, classification: &Classification) -> Result<(), String> {
        let response = self
            .client
            .post(&self.url)
            .json(classification)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == BACKPRESSURE_STATUS {
            Err(format!("sink back-pressure ({})", response.status()))
        } else {
            Err(format!("sink transport failure ({})", response.status()))
        }
    }
}

/// Consumes classifications from the correlator and the orphan flusher and submits each
/// through `submitter`. Submissions run as independent tasks so a slow/retrying one never
/// blocks the next classification from being picked up; `SinkSubmitter`'s own semaphore is
/// what bounds actual in-flight HTTP concurrency.
pub async fn run_dispatch(mut rx: mpsc::Receiver<Classification>, submitter: Arc<SinkSubmitter>) {
    let mut tasks = tokio::task::JoinSet::new();
    loop {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Some(classification) => {
                        let submitter = submitter.clone();
                        tasks.spawn(async move { submitter.submit(classification).await });
                    }
                    None => break,
                }
            }
            joined = tasks.join_next(), if !tasks.is_empty() => {
                let _ = joined;
            }
        }
    }
    while tasks.join_next().await.is_some() {}
}
