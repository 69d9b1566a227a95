//! Research session state: the concepts a user highlighted and the pages they
//! highlighted them on.

mod export;
mod storage;
mod store;

pub use export::{ExportSummary, SessionExport, export_filename, iso_timestamp};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use store::{SESSION_KEY, SessionStore, SessionStoreError};

use rand::Rng;
use serde::{Deserialize, Serialize};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Current time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a session id: `session_<random base36>_<epoch ms>`.
#[must_use]
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("session_{suffix}_{}", now_millis())
}

/// One highlighted text fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub text: String,
    /// Epoch milliseconds at selection time.
    pub timestamp: i64,
}

impl Concept {
    pub fn new(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            text: text.into(),
            timestamp,
        }
    }

    /// Capture a concept stamped with the current time.
    pub fn now(text: impl Into<String>) -> Self {
        Self::new(text, now_millis())
    }
}

/// The accumulated research state.
///
/// `concepts` and `urls` are append-only and grow together: every selection
/// adds one of each. `urls` is not deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default = "generate_session_id")]
    pub id: String,
    /// Creation time, epoch milliseconds.
    #[serde(default = "now_millis")]
    pub timestamp: i64,
    #[serde(default)]
    pub concepts: Vec<Concept>,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh, empty session with a new id and the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: generate_session_id(),
            timestamp: now_millis(),
            concepts: Vec::new(),
            urls: Vec::new(),
        }
    }

    pub fn append(&mut self, concept: Concept, url: impl Into<String>) {
        self.concepts.push(concept);
        self.urls.push(url.into());
    }

    /// True when there is nothing to export.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty() && self.urls.is_empty()
    }

    /// The last `n` concepts, oldest first.
    #[must_use]
    pub fn recent_concepts(&self, n: usize) -> &[Concept] {
        let start = self.concepts.len().saturating_sub(n);
        &self.concepts[start..]
    }
}
