//! The pending table (C3): the single piece of process-wide mutable state.
//!
//! `decide`, `expire`, and `drain` are the only mutators, and each completes without
//! suspending on I/O. `decide` collapses the classical check-then-act race (check if the
//! opposite side is present, then remove; otherwise insert) into one atomic compare-and-update
//! by taking the shard lock for the identity's key exactly once and branching inside it.

use std::time::Instant;

use dashmap::DashMap;
use streamcorr_sources::Side;

/// Outcome of a single `decide` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No prior entry; the identity is now pending.
    Stored,
    /// An opposite-side entry was present and has been removed.
    Matched,
    /// A same-side entry was already present and is left unchanged.
    IgnoredDuplicate,
}

struct PendingEntry {
    side: Side,
    first_seen: Instant,
}

/// Concurrent identity -> (side, first-seen) mapping with atomic compare-and-update.
///
/// Readers are not exposed: every observation of table state happens through `decide`,
/// `expire`, or `drain`, which is what makes those primitives sufficient to satisfy I1-I4
/// without any separate lock around "check, then act".
pub struct PendingTable {
    entries: DashMap<String, PendingEntry>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Atomic three-way compare-and-update. See module docs for why a single `entry` call
    /// (one shard-lock acquisition) is what gives this race-freedom.
    pub fn decide(&self, id: &str, side: Side, now: Instant) -> Outcome {
        use dashmap::mapref::entry::Entry;

        match self.entries.entry(id.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(PendingEntry {
                    side,
                    first_seen: now,
                });
                Outcome::Stored
            }
            Entry::Occupied(occupied) => {
                if occupied.get().side == side {
                    // I3: a same-side repeat never resets first_seen.
                    Outcome::IgnoredDuplicate
                } else {
                    occupied.remove();
                    Outcome::Matched
                }
            }
        }
    }

    /// Atomically removes and returns every id whose age is at least `deadline`.
    ///
    /// Must not collect candidate ids and remove them in a second pass: between the two, a
    /// concurrent `decide` could match and remove the same id, which would then get emitted as
    /// both `joined` and `orphaned`. `retain`'s predicate runs per-entry while that entry's
    /// shard lock is held, so the age check and the removal are a single atomic step — the
    /// same guarantee `decide` relies on.
    pub fn expire(&self, now: Instant, deadline: std::time::Duration) -> Vec<String> {
        let mut expired = Vec::new();
        self.entries.retain(|id, entry| {
            if now.saturating_duration_since(entry.first_seen) >= deadline {
                expired.push(id.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Evicts the oldest entries beyond `max_size`, returning the ids actually evicted. Used
    /// by the soft cap in the orphan flusher to bound memory under a one-sided flood ahead of
    /// the timed deadline (see the Open Question resolved in DESIGN.md: evict as orphans,
    /// never silently, to preserve I1).
    ///
    /// Age ordering is computed from a snapshot, but the removal itself is conditioned on the
    /// captured `first_seen` via `remove_if`: if a victim was matched and re-inserted with a
    /// fresh timestamp between the snapshot and the removal, the predicate fails and that
    /// entry survives rather than being evicted out from under its new sighting.
    pub fn evict_oldest_beyond(&self, max_size: usize) -> Vec<String> {
        let len = self.entries.len();
        if len <= max_size {
            return Vec::new();
        }
        let overflow = len - max_size;

        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.first_seen))
            .collect();
        by_age.sort_by_key(|(_, first_seen)| *first_seen);

        let mut victims = Vec::new();
        for (id, captured_first_seen) in by_age.into_iter().take(overflow) {
            let removed = self
                .entries
                .remove_if(&id, |_, entry| entry.first_seen == captured_first_seen);
            if removed.is_some() {
                victims.push(id);
            }
        }
        victims
    }

    /// Atomically removes and returns every remaining id. Used by the terminal drain.
    pub fn drain(&self) -> Vec<String> {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            self.entries.remove(id);
        }
        ids
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_sighting_stores() {
        let table = PendingTable::new();
        let outcome = table.decide("x", Side::A, Instant::now());
        assert_eq!(outcome, Outcome::Stored);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn opposite_side_matches_and_removes() {
        let table = PendingTable::new();
        table.decide("x", Side::A, Instant::now());
        let outcome = table.decide("x", Side::B, Instant::now());
        assert_eq!(outcome, Outcome::Matched);
        assert!(table.is_empty());
    }

    #[test]
    fn same_side_repeat_is_ignored_and_preserves_timestamp() {
        let table = PendingTable::new();
        let t0 = Instant::now();
        table.decide("x", Side::A, t0);

        let outcome = table.decide("x", Side::A, t0 + Duration::from_secs(5));
        assert_eq!(outcome, Outcome::IgnoredDuplicate);
        assert_eq!(table.len(), 1);

        // Because the timestamp wasn't refreshed, a deadline measured from t0 should expire
        // this entry even though the duplicate arrived later.
        let expired = table.expire(t0 + Duration::from_secs(10), Duration::from_secs(6));
        assert_eq!(expired, vec!["x".to_string()]);
    }

    #[test]
    fn expire_only_removes_entries_past_deadline() {
        let table = PendingTable::new();
        let t0 = Instant::now();
        table.decide("old", Side::A, t0);
        table.decide("new", Side::A, t0 + Duration::from_secs(50));

        let expired = table.expire(t0 + Duration::from_secs(60), Duration::from_secs(60));
        assert_eq!(expired, vec!["old".to_string()]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn drain_removes_everything() {
        let table = PendingTable::new();
        table.decide("a", Side::A, Instant::now());
        table.decide("b", Side::B, Instant::now());

        let mut drained = table.drain();
        drained.sort();
        assert_eq!(drained, vec!["a".to_string(), "b".to_string()]);
        assert!(table.is_empty());
    }

    #[test]
    fn evict_oldest_beyond_cap_keeps_newest() {
        let table = PendingTable::new();
        let t0 = Instant::now();
        table.decide("a", Side::A, t0);
        table.decide("b", Side::A, t0 + Duration::from_secs(1));
        table.decide("c", Side::A, t0 + Duration::from_secs(2));

        let evicted = table.evict_oldest_beyond(2);
        assert_eq!(evicted, vec!["a".to_string()]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn evict_oldest_beyond_cap_is_noop_under_cap() {
        let table = PendingTable::new();
        table.decide("a", Side::A, Instant::now());
        assert!(table.evict_oldest_beyond(10).is_empty());
    }
}
