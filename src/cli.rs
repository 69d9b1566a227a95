//! Command-line entry points.

use crate::config::{Config, sona_config_dir};
use crate::content::{
    ContentEvent, ContentScript, ContentSettings, POPUP_TITLE, PopupView,
    RecordingSurface, StaticPage,
};
use crate::explain::ExplanationClient;
use crate::popup::{ExportOutcome, PopupPanel, SessionStats};
use crate::router::{Background, ContentMessage};
use crate::session::SessionStore;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Width explanations are wrapped to when printed.
const PRINT_WIDTH: usize = 80;

/// Highlight-to-explain research assistant
#[derive(Parser, Debug)]
#[command(name = "sona", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a text file; select text to get explanations
    Read {
        /// File to open
        file: PathBuf,
    },
    /// Explain a piece of text once and print the result
    Explain(ExplainArgs),
    /// Show or manage the current research session
    Session(SessionArgs),
    /// Run the explanation server
    Serve(ServeArgs),
    /// View configuration
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct ExplainArgs {
    /// Text to explain
    pub text: String,

    /// URL of the page the text came from
    #[arg(long, default_value = "")]
    pub url: String,

    /// Title of the page the text came from
    #[arg(long, default_value = "")]
    pub title: String,

    /// Page text sent as context (truncated)
    #[arg(long, default_value = "")]
    pub page_text: String,
}

#[derive(Parser, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub action: Option<SessionAction>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Show counts and recent concepts (default)
    Show,
    /// Start a new session, discarding the current one
    New,
    /// Export the session as JSON into the download directory
    Export,
    /// Open the session history page
    History,
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind (default from config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (default from config or PORT)
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Show config file path
    Path,
    /// Show the effective configuration (default)
    Show,
}

/// Initialize logging once.
///
/// `SONA_LOG` sends debug logs to `sona.log` (the reader owns the terminal);
/// otherwise `RUST_LOG` picks the filter, falling back to `default` if given.
pub fn init_tracing(default: Option<&str>) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    if std::env::var("SONA_LOG").is_ok() {
        match std::fs::File::create("sona.log") {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false);
                let filter = EnvFilter::new("sona=debug");
                let _ = tracing_subscriber::registry()
                    .with(file_layer.with_filter(filter))
                    .try_init();
            }
            Err(err) => {
                eprintln!("Failed to create log file: {err}");
            }
        }
    } else if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else if let Some(default) = default {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(default))
            .try_init();
    }
}

fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Run the reader on `file`.
pub async fn read(config: &Config, file: PathBuf) -> ExitCode {
    report(crate::tui::run(config, &file).await)
}

/// Run the explain command
pub async fn explain(config: &Config, args: ExplainArgs) -> ExitCode {
    match explain_inner(config, args).await {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Send the text through the background service exactly as the context menu
/// would, and return the finished popup as printable lines.
async fn explain_inner(config: &Config, args: ExplainArgs) -> Result<Vec<String>> {
    let store = Arc::new(SessionStore::open(&config.storage_path()));
    let explainer = Arc::new(ExplanationClient::from_config(config)?);
    let (background, handle) = Background::new(store, explainer);
    let service = background.spawn();

    let page = StaticPage::new(args.url, args.title, args.page_text);
    let (mut script, mut events) = ContentScript::new(
        page,
        RecordingSurface::new(),
        handle,
        ContentSettings::from_config(config),
    );

    script.handle(ContentEvent::Message(ContentMessage::ExplainText {
        selected_text: args.text,
    }));
    while script.popup().is_some_and(PopupView::is_loading) {
        let event = events
            .recv()
            .await
            .context("Content event queue closed")?;
        script.handle(event);
    }

    let view = script
        .popup()
        .cloned()
        .context("No explanation was produced")?;
    drop(script);
    let _ = service.await;

    let mut lines = vec![
        POPUP_TITLE.to_string(),
        format!("\u{201c}{}\u{201d}", view.selected_text),
        String::new(),
    ];
    lines.extend(crate::tui::popup_lines(&view.body, PRINT_WIDTH));
    Ok(lines)
}

/// Run a session command
pub async fn session(config: &Config, args: SessionArgs) -> ExitCode {
    let store = Arc::new(SessionStore::open(&config.storage_path()));
    let panel = PopupPanel::from_config(config, store);
    report(session_inner(&panel, args.action.unwrap_or(SessionAction::Show)).await)
}

async fn session_inner(panel: &PopupPanel, action: SessionAction) -> Result<()> {
    match action {
        SessionAction::Show => {
            for line in stats_lines(&panel.stats().await) {
                println!("{line}");
            }
        }
        SessionAction::New => {
            let (stats, notice) = panel.new_session().await?;
            println!("{}", notice.message);
            println!("Session: {}", stats.session_id);
        }
        SessionAction::Export => {
            let (outcome, notice) = panel.export().await?;
            println!("{}", notice.message);
            if let ExportOutcome::Exported { path, .. } = outcome {
                println!("{}", path.display());
            }
        }
        SessionAction::History => panel.view_history()?,
    }
    Ok(())
}

/// `session show` output. Recent concepts are listed oldest first.
fn stats_lines(stats: &SessionStats) -> Vec<String> {
    let mut lines = vec![
        format!("Session: {}", stats.session_id),
        format!("Concepts: {}", stats.concept_count),
        format!("URLs: {}", stats.url_count),
    ];
    if stats.recent.is_empty() {
        lines.push("No concepts yet".to_string());
    } else {
        lines.push("Recent concepts:".to_string());
        lines.extend(stats.recent.iter().map(|c| format!("  - {}", c.text)));
    }
    lines
}

/// Run the explanation server until Ctrl-C
pub async fn serve(config: &Config, args: ServeArgs) -> ExitCode {
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
        }
        on_signal.cancel();
    });

    let result = crate::server::serve((host.as_str(), port), cancel)
        .await
        .with_context(|| format!("Failed to serve on {host}:{port}"));
    report(result)
}

/// Run the config command
#[must_use]
pub fn config(config: &Config, args: &ConfigArgs) -> ExitCode {
    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Path => {
            println!("{}", sona_config_dir().join("config.toml").display());
            ExitCode::SUCCESS
        }
        ConfigAction::Show => match toml::to_string_pretty(config) {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::from(1)
            }
        },
    }
}
