//! Saving exported files.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Give up after this many `name (n).ext` candidates.
const MAX_UNIQUE_ATTEMPTS: u32 = 1000;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
}

#[async_trait]
pub trait Downloads: Send + Sync {
    /// Save `contents` under `filename`, returning where it landed.
    async fn download(&self, filename: &str, contents: &[u8]) -> Result<PathBuf, DownloadError>;
}

/// Writes downloads into one directory. Existing files are never overwritten:
/// `a.json` becomes `a (1).json`, `a (2).json`, ...
#[derive(Debug, Clone)]
pub struct DirDownloads {
    dir: PathBuf,
}

impl DirDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Downloads for DirDownloads {
    async fn download(&self, filename: &str, contents: &[u8]) -> Result<PathBuf, DownloadError> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename == "."
            || filename == ".."
        {
            return Err(DownloadError::InvalidName(filename.to_string()));
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        for attempt in 0..MAX_UNIQUE_ATTEMPTS {
            let path = self.dir.join(candidate_name(filename, attempt));
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match file {
                Ok(mut file) => {
                    file.write_all(contents).await?;
                    file.flush().await?;
                    tracing::info!(path = %path.display(), bytes = contents.len(), "Saved download");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }

        Err(DownloadError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free name for {filename}"),
        )))
    }
}

/// `name.ext`, then `name (1).ext`, `name (2).ext`, ...
fn candidate_name(filename: &str, attempt: u32) -> String {
    if attempt == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({attempt}).{ext}"),
        _ => format!("{filename} ({attempt})"),
    }
}
