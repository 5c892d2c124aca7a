//! Error types for repocheck.

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised by the scan pipeline and report writers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An external command could not be started.
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external command exceeded its deadline and was killed.
    #[error("{program:?} timed out after {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    /// A report could not be written to its destination.
    #[error("writing report {}: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The target root is missing or unusable; nothing is scheduled.
    #[error("{0}")]
    FatalInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
