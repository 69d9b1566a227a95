//! Terminal setup, the poll/update/draw loop, and cleanup.

use super::{Reader, TerminalPage, render};
use crate::config::Config;
use crate::content::ContentSettings;
use crate::explain::ExplanationClient;
use crate::popup::PopupPanel;
use crate::router::Background;
use crate::session::SessionStore;
use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{
        self, BeginSynchronizedUpdate, EndSynchronizedUpdate, EnterAlternateScreen,
        LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    },
};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Guard that restores the original panic hook on drop.
struct PanicHookGuard {
    original_hook: Arc<dyn Fn(&std::panic::PanicHookInfo) + Send + Sync + 'static>,
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        let original_hook = Arc::clone(&self.original_hook);
        std::panic::set_hook(Box::new(move |info| {
            (original_hook)(info);
        }));
    }
}

fn restore_terminal(stdout: &mut io::Stdout) -> io::Result<()> {
    let _ = execute!(stdout, EndSynchronizedUpdate);
    execute!(stdout, DisableMouseCapture, LeaveAlternateScreen, Show)?;
    disable_raw_mode()
}

/// Show `path` in the reader until the user quits.
pub async fn run(config: &Config, path: &Path) -> Result<()> {
    let (width, height) = terminal::size().context("Not a terminal")?;
    let page = TerminalPage::open(path, width as usize)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let store = Arc::new(SessionStore::open(&config.storage_path()));
    let explainer = Arc::new(ExplanationClient::from_config(config)?);
    let cancel = CancellationToken::new();
    let (background, handle) = Background::new(Arc::clone(&store), explainer);
    let background = background.with_cancel(cancel.clone()).spawn();

    let panel = PopupPanel::from_config(config, store);
    let mut reader = Reader::new(
        page,
        handle,
        ContentSettings::from_config(config),
        panel,
        (width, height),
    );

    // Restore the terminal on panic (guard restores the original hook on exit)
    let original_hook: Arc<dyn Fn(&std::panic::PanicHookInfo) + Send + Sync> =
        Arc::from(std::panic::take_hook());
    let hook_for_panic = Arc::clone(&original_hook);
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal(&mut io::stdout());
        (hook_for_panic)(info);
    }));
    let _panic_guard = PanicHookGuard { original_hook };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, Hide)?;

    let result = event_loop(&mut reader, &mut stdout, (width, height)).await;

    // Let the background apply session writes queued before quitting.
    cancel.cancel();
    let restored = restore_terminal(&mut stdout);
    if let Err(e) = background.await {
        tracing::warn!("Background task failed: {e}");
    }
    restored?;
    result
}

async fn event_loop(
    reader: &mut Reader,
    stdout: &mut io::Stdout,
    (mut width, mut height): (u16, u16),
) -> Result<()> {
    loop {
        if event::poll(Duration::from_millis(50))? {
            let evt = event::read()?;
            if let event::Event::Resize(w, h) = evt {
                width = w;
                height = h;
            }
            reader.handle_event(evt).await;
        }

        reader.update().await;

        if reader.should_quit {
            return Ok(());
        }

        if reader.take_redraw() {
            execute!(stdout, BeginSynchronizedUpdate)?;
            render::draw(stdout, reader, width, height)?;
            execute!(stdout, EndSynchronizedUpdate)?;
            stdout.flush()?;
        }
    }
}
