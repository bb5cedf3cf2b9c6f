use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to clean outputs in {}: {source}", path.display())]
    Clean {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("compiler failed: {0}")]
    Compiler(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write state for task {task}: {source}")]
    Write {
        task: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode state for task {task}: {source}")]
    Encode {
        task: String,
        #[source]
        source: bincode::Error,
    },
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
