//! The lifecycle coordinator (C7): wires sources, correlator, flusher, and sink together, and
//! owns the shutdown sequence — normal termination when both sources reach end-of-stream, or
//! signal-driven shutdown on SIGINT/SIGTERM, followed in either case by a deadline-bounded
//! terminal drain of whatever is still pending.

use std::sync::Arc;

use streamcorr_sources::extractor::{SourceAExtractor, SourceBExtractor};
use streamcorr_sources::{poller, Side};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::classification::Classification;
use crate::config::Config;
use crate::correlator;
use crate::flusher::{self, FlusherConfig};
use crate::pending::PendingTable;
use crate::sink::{self, RetryConfig, SinkSubmitter};

/// Channel capacity for the internal observation and classification queues. Not part of the
/// configuration surface — these are plumbing, not a tuning knob the spec exposes.
const CHANNEL_CAPACITY: usize = 1024;

/// Runs the full pipeline to completion and returns `true` on a clean shutdown, `false` if the
/// terminal drain deadline was exceeded with entries still un-submitted.
pub async fn run(config: Config, client: reqwest::Client) -> bool {
    let table = Arc::new(PendingTable::new());
    let cancel = CancellationToken::new();
    let (class_tx, class_rx) = mpsc::channel::<Classification>(CHANNEL_CAPACITY);

    let submitter = Arc::new(SinkSubmitter::new(
        client.clone(),
        config.sink_url(),
        RetryConfig {
            max_retries: config.max_retries,
            initial_delay: config.post_retry_delay(),
            ..RetryConfig::default()
        },
        config.sink_concurrency,
    ));
    let dispatch_handle = tokio::spawn(sink::run_dispatch(class_rx, submitter.clone()));

    let (a_handle, a_rx) = poller::spawn(
        client.clone(),
        poller::PollerConfig {
            url: config.source_a_url(),
            poll_interval: config.flush_interval(),
            retry_delay: config.post_retry_delay(),
        },
        Side::A,
        SourceAExtractor,
        CHANNEL_CAPACITY,
        cancel.clone(),
    );
    let (b_handle, b_rx) = poller::spawn(
        client.clone(),
        poller::PollerConfig {
            url: config.source_b_url(),
            poll_interval: config.flush_interval(),
            retry_delay: config.post_retry_delay(),
        },
        Side::B,
        SourceBExtractor,
        CHANNEL_CAPACITY,
        cancel.clone(),
    );

    let correlator_a = tokio::spawn(correlator::run_side(a_rx, table.clone(), class_tx.clone()));
    let correlator_b = tokio::spawn(correlator::run_side(b_rx, table.clone(), class_tx.clone()));

    let flusher_cancel = cancel.clone();
    let flusher_class_tx = class_tx.clone();
    let flusher_table = table.clone();
    let flusher_handle = tokio::spawn(flusher::run(
        flusher_table,
        FlusherConfig {
            flush_interval: config.flush_interval(),
            orphan_timeout: config.orphan_timeout(),
            max_pending_size: config.max_pending_size,
        },
        flusher_class_tx,
        flusher_cancel,
    ));

    // Readers are "done" once both source pollers and both correlator tasks have exited —
    // either the upstream sides both hit their end sentinel, or a shutdown signal cancelled
    // the pollers, which closed their observation channels, which drained the correlators.
    let readers_done = async {
        let _ = a_handle.await;
        let _ = b_handle.await;
        let _ = correlator_a.await;
        let _ = correlator_b.await;
    };
    tokio::pin!(readers_done);

    loop {
        tokio::select! {
            _ = &mut readers_done => {
                info!("both upstream sides reached end-of-stream, proceeding to shutdown");
                break;
            }
            signal = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                if signal.is_ok() {
                    info!("shutdown signal received, cancelling sources");
                }
                cancel.cancel();
            }
        }
    }

    // Idempotent: already cancelled if a signal drove this shutdown, a no-op otherwise. Either
    // way, this is what stops the flusher's tick loop.
    cancel.cancel();
    let _ = flusher_handle.await;

    // No more classifications will be produced by the correlator or flusher. Dropping this
    // coordinator's own sender clone lets the dispatch channel close once drained.
    drop(class_tx);

    let deadline = config.shutdown_deadline();
    let drain_table = table.clone();
    let drain_result = tokio::time::timeout(deadline, terminal_drain(dispatch_handle, table, submitter)).await;

    match drain_result {
        Ok(()) => {
            info!("terminal drain completed cleanly");
            true
        }
        Err(_) => {
            // Whatever is still in the table when the deadline fires never got submitted;
            // entries already pulled into in-flight submit tasks are not reflected here.
            let remaining = drain_table.len();
            warn!(
                deadline_secs = deadline.as_secs(),
                remaining, "terminal drain deadline exceeded"
            );
            false
        }
    }
}

/// Flushes whatever classifications are already queued for the sink, then submits one
/// `orphaned` classification per identity still left in the pending table.
async fn terminal_drain(
    dispatch_handle: tokio::task::JoinHandle<()>,
    table: Arc<PendingTable>,
    submitter: Arc<SinkSubmitter>,
) {
    let _ = dispatch_handle.await;

    let remaining = table.drain();
    if remaining.is_empty() {
        return;
    }
    info!(count = remaining.len(), "terminal drain submitting stranded pending entries as orphans");

    let mut tasks = tokio::task::JoinSet::new();
    for id in remaining {
        let submitter = submitter.clone();
        tasks.spawn(async move {
            submitter.submit(Classification::orphaned(id)).await;
        });
    }
    while tasks.join_next().await.is_some() {}
}
