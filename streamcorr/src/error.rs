// streamcorr: Error types

use thiserror::Error;

/// Correlator result type
pub type Result<T> = std::result::Result<T, CorrelatorError>;

/// Per the propagation policy, none of these surface across component boundaries during
/// normal operation — each is logged and absorbed where it occurs. The one exception is
/// `ShutdownDeadlineExceeded`, which the lifecycle coordinator uses to pick the process exit
/// code.
#[derive(Debug, Error)]
pub enum CorrelatorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("terminal drain deadline exceeded with {remaining} identities still pending")]
    ShutdownDeadlineExceeded { remaining: usize },
}
