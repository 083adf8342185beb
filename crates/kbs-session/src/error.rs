use thiserror::Error;

/// Failure to retrieve the kconfig bundle archive.
///
/// `Clone` so the same failure can be reported to a log sink and returned to
/// the caller. Payloads are plain strings: in the browser the underlying
/// error originates from JavaScript and has no `std::io::Error` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("bundle request failed with HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("bundle request failed: {0}")]
    Transport(String),
}

/// Failure to read the user-supplied starting configuration.
///
/// Deliberately separate from [`FetchError`]: a config read failure is
/// non-fatal to the handshake (the session proceeds from scratch), while a
/// bundle fetch failure aborts it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config read failed: {0}")]
pub struct ConfigReadError(pub String);

#[derive(Debug, Error)]
pub enum SessionError {
    /// A transfer is already in flight, or the machine is mid-run. Starting
    /// a second session would race on the shared filesystem and console
    /// channel, so it is rejected outright.
    #[error("a session is already in flight")]
    Busy,

    #[error(transparent)]
    Bundle(#[from] FetchError),
}
