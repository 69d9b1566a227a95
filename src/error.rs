use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::session::StorageError),

    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionStoreError),

    #[error("Explanation error: {0}")]
    Explain(#[from] crate::explain::ExplainError),

    #[error("Download error: {0}")]
    Download(#[from] crate::popup::DownloadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
