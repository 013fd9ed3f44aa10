//! Upstream source readers and record extractors.
//!
//! Each upstream side is modeled as an [`Extractor`] (pure parsing, no I/O) driven by a
//! [`poller`] loop that owns the HTTP polling, retry-on-transport-error, and end-sentinel
//! handling. The correlator only ever sees the resulting stream of [`Observation`]s.

pub mod extractor;
pub mod poller;

pub use extractor::{ExtractOutcome, Extractor};
pub use poller::{PollerConfig, SourcePoller};

/// Origin of an observed identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// An identity observed on one side of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub side: Side,
    pub id: String,
}
