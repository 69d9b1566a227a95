//! Session export document.

use super::{Concept, Session};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// The downloadable JSON document for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub session_id: String,
    /// Session creation time, ISO-8601.
    pub timestamp: String,
    pub summary: ExportSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total_concepts: usize,
    pub total_urls: usize,
    pub concepts: Vec<Concept>,
    pub urls: Vec<String>,
}

impl SessionExport {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            timestamp: iso_timestamp(session.timestamp),
            summary: ExportSummary {
                total_concepts: session.concepts.len(),
                total_urls: session.urls.len(),
                concepts: session.concepts.clone(),
                urls: session.urls.clone(),
            },
        }
    }

    /// Indented JSON, two spaces per level.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Epoch milliseconds as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn iso_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `sona-session-<YYYY-MM-DD>.json` for the given export date.
#[must_use]
pub fn export_filename(date: DateTime<Utc>) -> String {
    format!("sona-session-{}.json", date.format("%Y-%m-%d"))
}
