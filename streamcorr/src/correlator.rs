//! The correlator (C4): applies `decide` to each observed `(side, id)` and emits `joined`
//! classifications on match. Safe to run one task per side concurrently — `PendingTable`'s
//! atomicity is the only correctness guarantee this needs.

use std::sync::Arc;
use std::time::Instant;

use streamcorr_sources::Observation;
use tokio::sync::mpsc;
use tracing::debug;

use crate::classification::Classification;
use crate::pending::{Outcome, PendingTable};

/// Consumes one side's observation stream until it ends, applying `decide` to each identity
/// and forwarding `joined` classifications on `classifications_tx`.
pub async fn run_side(
    mut observations: mpsc::Receiver<Observation>,
    table: Arc<PendingTable>,
    classifications_tx: mpsc::Sender<Classification>,
) {
    while let Some(obs) = observations.recv().await {
        match table.decide(&obs.id, obs.side, Instant::now()) {
            Outcome::Stored => {}
            Outcome::Matched => {
                if classifications_tx
                    .send(Classification::joined(obs.id))
                    .await
                    .is_err()
                {
                    // Sink dispatch shut down; nothing left to deliver to.
                    return;
                }
            }
            Outcome::IgnoredDuplicate => {
                debug!(side = %obs.side, id = %obs.id, "ignored same-side duplicate");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamcorr_sources::Side;

    #[tokio::test]
    async fn symmetric_match_emits_one_joined() {
        let table = Arc::new(PendingTable::new());
        let (obs_tx, obs_rx) = mpsc::channel(8);
        let (class_tx, mut class_rx) = mpsc::channel(8);

        let handle = tokio::spawn(run_side(obs_rx, table.clone(), class_tx));

        obs_tx
            .send(Observation {
                side: Side::A,
                id: "x".into(),
            })
            .await
            .unwrap();
        obs_tx
            .send(Observation {
                side: Side::B,
                id: "x".into(),
            })
            .await
            .unwrap();
        drop(obs_tx);
        handle.await.unwrap();

        let emitted = class_rx.recv().await.unwrap();
        assert_eq!(emitted, Classification::joined("x"));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn same_side_duplicate_emits_nothing() {
        let table = Arc::new(PendingTable::new());
        let (obs_tx, obs_rx) = mpsc::channel(8);
        let (class_tx, mut class_rx) = mpsc::channel(8);

        let handle = tokio::spawn(run_side(obs_rx, table.clone(), class_tx));

        obs_tx
            .send(Observation {
                side: Side::A,
                id: "x".into(),
            })
            .await
            .unwrap();
        obs_tx
            .send(Observation {
                side: Side::A,
                id: "x".into(),
            })
            .await
            .unwrap();
        drop(obs_tx);
        handle.await.unwrap();

        assert!(class_rx.recv().await.is_none());
        assert_eq!(table.len(), 1);
    }
}
