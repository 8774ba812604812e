use thiserror::Error;

/// Errors surfaced to the caller of a run.
///
/// Exhausted limits and failed units of work are never errors; they end up in
/// the returned [`crate::Stats`]. Only configuration and setup problems land here.
#[derive(Error, Debug)]
pub enum Error {
    /// A run needs at least one worker.
    #[error("worker count must be positive")]
    NoWorkers,

    /// The stats task cannot tick on a zero interval.
    #[error("stats interval must be non-zero")]
    ZeroStatsInterval,

    /// Installing the SIGINT/SIGTERM handlers failed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
