use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackupError>;

/// How a stage failure affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the run; later stages are skipped.
    Fatal,
    /// Logged at error level; the run continues to the next stage.
    Recoverable,
    /// Logged at warn level; never affects run outcome.
    Warning,
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to create working directory '{path}': {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive creation failed: {0}")]
    Archive(String),

    #[error("upload of '{key}' failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("listing backups under '{prefix}' failed: {reason}")]
    PruneList { prefix: String, reason: String },

    #[error("deleting expired backups failed: {reason}")]
    PruneDelete { reason: String },

    #[error("failed to remove working directory '{path}': {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl BackupError {
    /// Severity policy for the pipeline: durability failures (archive,
    /// upload) are fatal; housekeeping failures (prune, cleanup) are not.
    pub fn severity(&self) -> Severity {
        match self {
            BackupError::PruneList { .. } | BackupError::PruneDelete { .. } => {
                Severity::Recoverable
            }
            BackupError::Cleanup { .. } => Severity::Warning,
            _ => Severity::Fatal,
        }
    }
}
