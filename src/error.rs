// Takeout Sync Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TakeoutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Sidecar error: {0}")]
    Sidecar(String),

    #[error("Invalid file name pattern: {0}")]
    InvalidPattern(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for TakeoutError {
    fn from(err: anyhow::Error) -> Self {
        TakeoutError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TakeoutError>;
