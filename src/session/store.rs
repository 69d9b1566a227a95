//! The current-session record and its read-modify-write operations.

use super::storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
use super::{Concept, Session};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Storage key holding the serialized current session.
pub const SESSION_KEY: &str = "currentSession";

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Owner of the single "current" session.
///
/// Every mutation reads the whole record, changes it and writes the whole
/// record back while holding `write_lock`, so appends within one process never
/// interleave. Separate processes sharing one storage file are last-write-wins.
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by a JSON file at `path`.
    pub fn open(path: &Path) -> Self {
        Self::new(Arc::new(FileStorage::new(path)))
    }

    /// Store backed by process memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// The persisted session, or a fresh empty one. Never fails.
    pub async fn load(&self) -> Session {
        match self.read_current().await {
            Ok(Some(session)) => session,
            Ok(None) => Session::new(),
            Err(e) => {
                tracing::warn!("Failed to read session, showing an empty one: {e}");
                Session::new()
            }
        }
    }

    /// Append one concept and its page URL to the current session, creating
    /// the session first if none is persisted. Returns the updated session.
    pub async fn append_concept(
        &self,
        concept: Concept,
        url: &str,
    ) -> Result<Session, SessionStoreError> {
        let _guard = self.write_lock.lock().await;

        // A read failure must not be mistaken for "no session": writing an empty
        // session back would wipe the stored one.
        let mut session = self.read_current().await?.unwrap_or_default();
        session.append(concept, url);
        self.write(&session).await?;

        tracing::debug!(
            session = %session.id,
            concepts = session.concepts.len(),
            "Appended concept"
        );
        Ok(session)
    }

    /// Replace the current session wholesale.
    pub async fn replace(&self, session: &Session) -> Result<(), SessionStoreError> {
        let _guard = self.write_lock.lock().await;
        self.write(session).await
    }

    /// Replace the current session with a fresh empty one and return it.
    pub async fn start_new(&self) -> Result<Session, SessionStoreError> {
        let session = Session::new();
        self.replace(&session).await?;
        tracing::info!(session = %session.id, "Started new session");
        Ok(session)
    }

    async fn read_current(&self) -> Result<Option<Session>, StorageError> {
        let Some(value) = self.storage.get(SESSION_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_value::<Session>(value) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("Discarding unreadable session record: {e}");
                Ok(None)
            }
        }
    }

    async fn write(&self, session: &Session) -> Result<(), SessionStoreError> {
        let value = serde_json::to_value(session)?;
        self.storage.set(SESSION_KEY, value).await?;
        Ok(())
    }
}
