//! Runner errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize summary: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("refusing to clean {0}: it contains the working directory")]
    UnsafeArtifactRoot(PathBuf),
}

pub type RunnerResult<T> = std::result::Result<T, RunnerError>;
