use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default explanation service base URL.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000";
/// Default port for `sona serve`.
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the explanation service. `/api/explain` is appended.
    pub endpoint: String,
    /// Where the persisted session storage lives.
    pub data_dir: PathBuf,
    /// Target directory for exported session files.
    pub download_dir: PathBuf,

    /// Upper bound on a single explanation request. Default: 30.
    pub request_timeout_secs: u64,

    /// Window over which selection changes are coalesced. Default: 150.
    pub selection_debounce_ms: u64,
    /// How long the "ask" prompt stays up untouched. Default: 5000.
    pub prompt_timeout_ms: u64,
    /// Lifetime of transient notices. Default: 3000.
    pub notice_ms: u64,

    /// Max characters of page text sent as context. Default: 500.
    pub page_text_limit: usize,
    /// Number of concepts listed in the session panel. Default: 5.
    pub recent_concepts: usize,

    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("sona"))
            .unwrap_or_else(|| PathBuf::from(".sona"));
        let download_dir = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            data_dir,
            download_dir,
            request_timeout_secs: 30,
            selection_debounce_ms: 150,
            prompt_timeout_ms: 5000,
            notice_ms: 3000,
            page_text_limit: 500,
            recent_concepts: 5,
            server: ServerConfig::default(),
        }
    }
}

/// Directory holding `config.toml`.
pub fn sona_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("sona"))
        .unwrap_or_else(|| PathBuf::from(".sona"))
}

impl Config {
    /// Path to the persisted key-value storage document.
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join("storage.json")
    }

    /// Page opened by "view history".
    pub fn history_page(&self) -> PathBuf {
        self.data_dir.join("history.html")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn selection_debounce(&self) -> Duration {
        Duration::from_millis(self.selection_debounce_ms)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_millis(self.prompt_timeout_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_ms)
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = sona_config_dir().join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `SONA_ENDPOINT` and `PORT` overrides.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("SONA_ENDPOINT").filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint.trim_end_matches('/').to_string();
        }

        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!("Ignoring invalid PORT '{port}': {e}"),
            }
        }
    }
}
