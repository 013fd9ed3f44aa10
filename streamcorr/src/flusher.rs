//! The orphan flusher (C5): periodically expires pending entries older than the orphan
//! deadline, and enforces the soft cap on pending table size ahead of that deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::classification::Classification;
use crate::pending::PendingTable;

pub struct FlusherConfig {
    pub flush_interval: Duration,
    pub orphan_timeout: Duration,
    pub max_pending_size: usize,
}

/// Runs until `cancel` fires. Cancellable at tick boundaries only — a tick already in
/// progress runs to completion.
pub async fn run(
    table: Arc<PendingTable>,
    config: FlusherConfig,
    classifications_tx: mpsc::Sender<Classification>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(config.flush_interval) => {}
        }

        let now = Instant::now();
        let expired = table.expire(now, config.orphan_timeout);
        if !expired.is_empty() {
            debug!(count = expired.len(), "orphan flusher expired entries");
        }
        for id in expired {
            if classifications_tx
                .send(Classification::orphaned(id))
                .await
                .is_err()
            {
                return;
            }
        }

        let evicted = table.evict_oldest_beyond(config.max_pending_size);
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "pending table over soft cap, evicted oldest as orphans");
        }
        for id in evicted {
            if classifications_tx
                .send(Classification::orphaned(id))
                .await
                .is_err()
            {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamcorr_sources::Side;

    #[tokio::test]
    async fn expires_entries_past_deadline() {
        let table = Arc::new(PendingTable::new());
        table.decide("x", Side::A, Instant::now());

        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let config = FlusherConfig {
            flush_interval: Duration::from_millis(5),
            orphan_timeout: Duration::from_millis(1),
            max_pending_size: 10_000,
        };

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(run(table.clone(), config, tx, cancel_clone));

        let emitted = rx.recv().await.unwrap();
        assert_eq!(emitted, Classification::orphaned("x"));
        assert!(table.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn empty_tick_does_no_work() {
        let table = Arc::new(PendingTable::new());
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let config = FlusherConfig {
            flush_interval: Duration::from_millis(5),
            orphan_timeout: Duration::from_secs(60),
            max_pending_size: 10_000,
        };

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(run(table, config, tx, cancel_clone));

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn soft_cap_evicts_oldest_as_orphans() {
        let table = Arc::new(PendingTable::new());
        let t0 = Instant::now();
        table.decide("old", Side::A, t0);
        table.decide("new", Side::A, t0);

        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let config = FlusherConfig {
            flush_interval: Duration::from_millis(5),
            orphan_timeout: Duration::from_secs(3600),
            max_pending_size: 1,
        };

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(run(table.clone(), config, tx, cancel_clone));

        let emitted = rx.recv().await.unwrap();
        assert_eq!(emitted.kind, crate::classification::Kind::Orphaned);
        assert_eq!(table.len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}
