//! The action popup: session statistics and session commands.

mod downloads;
mod tabs;

pub use downloads::{DirDownloads, DownloadError, Downloads};
pub use tabs::{SystemOpener, TabOpener};

use crate::config::Config;
use crate::session::{Concept, SessionExport, SessionStore, export_filename};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const NEW_SESSION_NOTICE: &str = "New research session started!";
pub const NOTHING_TO_EXPORT_NOTICE: &str = "No data to export";
pub const EXPORTED_NOTICE: &str = "Session exported successfully!";

/// What the popup displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub session_id: String,
    pub concept_count: usize,
    pub url_count: usize,
    /// Most recent concepts, oldest first.
    pub recent: Vec<Concept>,
}

/// A transient message that disappears after `ttl`.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub shown_at: Instant,
    pub ttl: Duration,
}

impl Notice {
    pub fn new(message: impl Into<String>, ttl: Duration) -> Self {
        Self {
            message: message.into(),
            shown_at: Instant::now(),
            ttl,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= self.ttl
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Both lists were empty; nothing was written.
    NothingToExport,
    Exported {
        path: PathBuf,
        export: SessionExport,
    },
}

pub struct PopupPanel {
    store: Arc<SessionStore>,
    downloads: Arc<dyn Downloads>,
    opener: Arc<dyn TabOpener>,
    history_url: String,
    recent_limit: usize,
    notice_ttl: Duration,
}

impl PopupPanel {
    pub fn new(
        store: Arc<SessionStore>,
        downloads: Arc<dyn Downloads>,
        opener: Arc<dyn TabOpener>,
        history_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            downloads,
            opener,
            history_url: history_url.into(),
            recent_limit: 5,
            notice_ttl: Duration::from_secs(3),
        }
    }

    pub fn from_config(config: &Config, store: Arc<SessionStore>) -> Self {
        let history_url = url::Url::from_file_path(config.history_page())
            .map(String::from)
            .unwrap_or_else(|()| config.history_page().display().to_string());

        Self::new(
            store,
            Arc::new(DirDownloads::new(&config.download_dir)),
            Arc::new(SystemOpener),
            history_url,
        )
        .with_recent_limit(config.recent_concepts)
        .with_notice_ttl(config.notice_duration())
    }

    #[must_use]
    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    #[must_use]
    pub fn with_notice_ttl(mut self, ttl: Duration) -> Self {
        self.notice_ttl = ttl;
        self
    }

    pub fn notice(&self, message: impl Into<String>) -> Notice {
        Notice::new(message, self.notice_ttl)
    }

    /// Load the session and summarize it for display.
    pub async fn stats(&self) -> SessionStats {
        let session = self.store.load().await;
        SessionStats {
            session_id: session.id.clone(),
            concept_count: session.concepts.len(),
            url_count: session.urls.len(),
            recent: session.recent_concepts(self.recent_limit).to_vec(),
        }
    }

    /// Replace the current session with a fresh one and return the reloaded
    /// display.
    pub async fn new_session(&self) -> crate::Result<(SessionStats, Notice)> {
        self.store.start_new().await?;
        let stats = self.stats().await;
        Ok((stats, self.notice(NEW_SESSION_NOTICE)))
    }

    /// Download the session as JSON unless it is empty.
    pub async fn export(&self) -> crate::Result<(ExportOutcome, Notice)> {
        let session = self.store.load().await;
        if session.is_empty() {
            return Ok((
                ExportOutcome::NothingToExport,
                self.notice(NOTHING_TO_EXPORT_NOTICE),
            ));
        }

        let export = SessionExport::from_session(&session);
        let json = export.to_json()?;
        let filename = export_filename(chrono::Utc::now());
        let path = self.downloads.download(&filename, json.as_bytes()).await?;

        tracing::info!(session = %session.id, path = %path.display(), "Exported session");
        Ok((
            ExportOutcome::Exported { path, export },
            self.notice(EXPORTED_NOTICE),
        ))
    }

    /// Open the history page in a new tab.
    pub fn view_history(&self) -> crate::Result<()> {
        self.opener.open(&self.history_url)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingDownloads {
        saved: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl Downloads for RecordingDownloads {
        async fn download(&self, filename: &str, contents: &[u8]) -> Result<PathBuf, DownloadError> {
            self.saved
                .lock()
                .unwrap()
                .push((filename.to_string(), contents.to_vec()));
            Ok(PathBuf::from(filename))
        }
    }

    #[derive(Default)]
    struct RecordingOpener {
        opened: Mutex<Vec<String>>,
    }

    impl TabOpener for RecordingOpener {
        fn open(&self, url: &str) -> std::io::Result<()> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    struct Fixture {
        panel: PopupPanel,
        store: Arc<SessionStore>,
        downloads: Arc<RecordingDownloads>,
        opener: Arc<RecordingOpener>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SessionStore::in_memory());
        let downloads = Arc::new(RecordingDownloads::default());
        let opener = Arc::new(RecordingOpener::default());
        let panel = PopupPanel::new(
            Arc::clone(&store),
            downloads.clone(),
            opener.clone(),
            "file:///tmp/history.html",
        );
        Fixture {
            panel,
            store,
            downloads,
            opener,
        }
    }

    async fn record(store: &SessionStore, n: usize) {
        for i in 0..n {
            store
                .append_concept(Concept::new(format!("c{i}"), i as i64), &format!("u{i}"))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_stats_show_counts_and_recent_five() {
        let f = fixture();
        record(&f.store, 7).await;

        let stats = f.panel.stats().await;
        assert_eq!(stats.concept_count, 7);
        assert_eq!(stats.url_count, 7);
        let recent: Vec<&str> = stats.recent.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(recent, vec!["c2", "c3", "c4", "c5", "c6"]);
    }

    #[tokio::test]
    async fn test_stats_first_run() {
        let f = fixture();
        let stats = f.panel.stats().await;
        assert_eq!(stats.concept_count, 0);
        assert_eq!(stats.url_count, 0);
        assert!(stats.recent.is_empty());
    }

    #[tokio::test]
    async fn test_new_session_resets() {
        let f = fixture();
        record(&f.store, 3).await;
        let old = f.store.load().await;

        let (stats, notice) = f.panel.new_session().await.unwrap();
        assert_eq!(stats.concept_count, 0);
        assert_eq!(stats.url_count, 0);
        assert_ne!(stats.session_id, old.id);
        assert_eq!(notice.message, NEW_SESSION_NOTICE);
        assert_eq!(notice.ttl, Duration::from_secs(3));

        let fresh = f.store.load().await;
        assert_eq!(fresh.id, stats.session_id);
        assert!(fresh.timestamp >= old.timestamp);
    }

    #[tokio::test]
    async fn test_export_empty_downloads_nothing() {
        let f = fixture();
        let (outcome, notice) = f.panel.export().await.unwrap();

        assert_eq!(outcome, ExportOutcome::NothingToExport);
        assert_eq!(notice.message, NOTHING_TO_EXPORT_NOTICE);
        assert!(f.downloads.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_writes_document() {
        let f = fixture();
        record(&f.store, 2).await;

        let (outcome, notice) = f.panel.export().await.unwrap();
        assert_eq!(notice.message, EXPORTED_NOTICE);
        let ExportOutcome::Exported { export, .. } = outcome else {
            panic!("expected an export");
        };
        assert_eq!(export.summary.total_concepts, 2);

        let saved = f.downloads.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        let (name, bytes) = &saved[0];
        assert!(name.starts_with("sona-session-") && name.ends_with(".json"));
        let parsed: SessionExport = serde_json::from_slice(bytes).unwrap();
        assert_eq!(parsed, export);
    }

    #[tokio::test]
    async fn test_export_into_directory() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SessionStore::in_memory());
        record(&store, 1).await;
        let panel = PopupPanel::new(
            Arc::clone(&store),
            Arc::new(DirDownloads::new(dir.path())),
            Arc::new(RecordingOpener::default()),
            "file:///tmp/history.html",
        );

        let (outcome, _) = panel.export().await.unwrap();
        let ExportOutcome::Exported { path, .. } = outcome else {
            panic!("expected an export");
        };
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_view_history_opens_page() {
        let f = fixture();
        f.panel.view_history().unwrap();
        assert_eq!(
            *f.opener.opened.lock().unwrap(),
            vec!["file:///tmp/history.html".to_string()]
        );
    }

    #[test]
    fn test_notice_expiry() {
        let notice = Notice::new("hi", Duration::from_secs(3));
        assert!(!notice.is_expired_at(notice.shown_at + Duration::from_secs(2)));
        assert!(notice.is_expired_at(notice.shown_at + Duration::from_secs(3)));
    }
}
