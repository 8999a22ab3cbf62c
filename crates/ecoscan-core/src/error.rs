use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the analysis pipeline.
///
/// Per-file problems never reach this type: they are logged and skipped where they
/// happen. Only failures that end a stage (or the whole run) are represented here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("source tree '{}' does not exist or is not a directory", .0.display())]
    SourceTree(PathBuf),

    #[error("failed to materialize source: {0}")]
    Source(String),

    #[error("generation service unavailable: {0}")]
    Generator(String),

    #[error("finding validation failed: {0}")]
    Validation(String),

    #[error("{stage} stage failed: {message}")]
    Stage { stage: &'static str, message: String },

    #[error("analysis cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
