use thiserror::Error;

/// Crate-wide error type.
///
/// Scan verdicts ("wrong rack type", "not in assigned location") are normal
/// success payloads, never errors. Only invalid input, missing records, and
/// infrastructure failures surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input shape; rejected before any mutation.
    #[error("{0}")]
    Validation(String),

    /// Label, location, session or flight absent; no mutation attempted.
    #[error("{0} not found")]
    NotFound(String),

    /// Duplicate creation or a delete blocked by existing references.
    #[error("{0}")]
    Conflict(String),

    /// Item scan arrived without a known scan session.
    #[error("Please scan rack location first")]
    SessionRequired,

    /// The scan session exists but its TTL has passed; rescan the rack.
    #[error("Scan session expired, please rescan the rack location")]
    SessionExpired,

    /// Underlying store failure. The enclosing transaction rolls back.
    #[error(transparent)]
    Dependency(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Dependency(anyhow::Error::new(err).context("database operation failed"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
