use thiserror::Error;

pub type Result<T> = std::result::Result<T, RevDbError>;

/// Failures of the revision index.
///
/// `Clone` because a single failed table fetch is fanned out to every caller
/// that was awaiting the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevDbError {
    #[error("revision table request failed with HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("revision table request failed: {0}")]
    Transport(String),

    /// The task driving the in-flight table fetch was dropped before it
    /// resolved; waiters see this instead of hanging forever.
    #[error("pending revision table fetch was dropped")]
    Cancelled,
}
