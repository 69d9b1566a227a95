//! Full-screen terminal reader: a text file acts as the page, with the
//! selection prompt, explanation popup and session panel drawn on top.

mod page;
mod render;
mod run;
mod surface;

pub use page::{Cursor, Direction, TerminalPage, wrap_rows};
pub use render::{Region, close_button, popup_region, popup_text_width, prompt_region, text_height};
pub use run::run;
pub use surface::{RenderedPopup, TerminalSurface, popup_lines};

use crate::content::{ContentEvent, ContentScript, ContentSettings};
use crate::menu::{ASK_SONA_ID, ContextMenu, MenuClick};
use crate::popup::{ExportOutcome, Notice, PopupPanel, SessionStats};
use crate::router::{BackgroundHandle, SaveFailure, TabId, TabRegistry};
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

const SCROLL_STEP: isize = 3;
const STATS_REFRESH: Duration = Duration::from_secs(1);
/// Quiet time after the last shift+arrow before a keyboard selection counts.
const KEY_SELECTION_SETTLE: Duration = Duration::from_millis(500);

pub struct Reader {
    script: ContentScript<TerminalPage, TerminalSurface>,
    events: mpsc::UnboundedReceiver<ContentEvent>,
    save_failures: broadcast::Receiver<SaveFailure>,
    panel: PopupPanel,
    menu: ContextMenu,
    tabs: TabRegistry,
    tab: TabId,
    /// Session panel contents while it is open.
    stats: Option<SessionStats>,
    stats_loaded_at: Option<Instant>,
    notice: Option<Notice>,
    dragging: bool,
    /// The current drag moved the selection.
    drag_changed: bool,
    /// Last shift+arrow that changed the selection, not yet reported.
    key_selection_at: Option<tokio::time::Instant>,
    size: (u16, u16),
    needs_redraw: bool,
    pub should_quit: bool,
}

impl Reader {
    pub fn new(
        page: TerminalPage,
        background: BackgroundHandle,
        settings: ContentSettings,
        panel: PopupPanel,
        size: (u16, u16),
    ) -> Self {
        let surface = TerminalSurface::new(popup_text_width(size.0));
        let save_failures = background.failures();
        let (script, events) = ContentScript::new(page, surface, background, settings);

        let mut tabs = TabRegistry::new();
        let (tx, messages) = mpsc::unbounded_channel();
        let tab = tabs.register(tx);
        script.attach(messages);

        Self {
            script,
            events,
            save_failures,
            panel,
            menu: ContextMenu::new(),
            tabs,
            tab,
            stats: None,
            stats_loaded_at: None,
            notice: None,
            dragging: false,
            drag_changed: false,
            key_selection_at: None,
            size,
            needs_redraw: true,
            should_quit: false,
        }
    }

    pub fn page(&self) -> &TerminalPage {
        self.script.page()
    }

    pub fn page_title(&self) -> String {
        use crate::content::Page;
        self.script.page().title()
    }

    pub fn surface(&self) -> &TerminalSurface {
        self.script.surface()
    }

    pub fn stats(&self) -> Option<&SessionStats> {
        self.stats.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// True once after anything visible changed.
    pub fn take_redraw(&mut self) -> bool {
        let surface = self.script.surface_mut().take_dirty();
        std::mem::take(&mut self.needs_redraw) || surface
    }

    /// Apply queued content events, expire notices, refresh the session panel.
    pub async fn update(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.script.handle(event);
        }

        self.report_save_failures();

        if self
            .key_selection_at
            .is_some_and(|at| at.elapsed() >= KEY_SELECTION_SETTLE)
        {
            self.key_selection_at = None;
            self.selection_changed();
        }

        if self.notice.as_ref().is_some_and(Notice::is_expired) {
            self.notice = None;
            self.needs_redraw = true;
        }

        if self.stats.is_some()
            && self
                .stats_loaded_at
                .is_none_or(|at| at.elapsed() >= STATS_REFRESH)
        {
            self.refresh_stats().await;
        }
    }

    pub async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key).await,
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(width, height) => {
                self.size = (width, height);
                self.script
                    .surface_mut()
                    .set_text_width(popup_text_width(width));
                if self.script.page_mut().rewrap(width as usize) {
                    self.selection_changed();
                }
                self.needs_redraw = true;
            }
            _ => {}
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                if self.script.popup().is_some() {
                    self.script.handle(ContentEvent::CloseClicked);
                } else if self.stats.take().is_some() {
                    self.needs_redraw = true;
                } else if self.script.page_mut().clear_selection() {
                    self.key_selection_at = None;
                    self.selection_changed();
                }
            }
            KeyCode::Enter => self.script.handle(ContentEvent::PromptClicked),
            KeyCode::Char('a') => self.ask_from_menu(),
            KeyCode::Char('s') => {
                if self.stats.take().is_some() {
                    self.needs_redraw = true;
                } else {
                    self.refresh_stats().await;
                }
            }
            KeyCode::Char('n') => self.new_session().await,
            KeyCode::Char('e') => self.export().await,
            KeyCode::Char('h') => self.view_history(),
            KeyCode::PageUp => self.scroll(-(text_height(self.size.1) as isize)),
            KeyCode::PageDown => self.scroll(text_height(self.size.1) as isize),
            code => {
                let direction = match code {
                    KeyCode::Up => Direction::Up,
                    KeyCode::Down => Direction::Down,
                    KeyCode::Left => Direction::Left,
                    KeyCode::Right => Direction::Right,
                    _ => return,
                };
                if self.script.page_mut().move_cursor(direction, shift) {
                    if shift {
                        // Reported once the run of shift+arrows pauses.
                        self.key_selection_at = Some(tokio::time::Instant::now());
                    } else {
                        self.key_selection_at = None;
                        self.selection_changed();
                    }
                }
                self.needs_redraw = true;
            }
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let (x, y) = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.click(x, y),
            MouseEventKind::Drag(MouseButton::Left) if self.dragging => {
                let to = self.page().hit(x, y.min(text_height(self.size.1).saturating_sub(1)));
                if self.script.page_mut().extend_selection(to) {
                    self.drag_changed = true;
                    self.needs_redraw = true;
                }
            }
            MouseEventKind::Up(MouseButton::Left) if self.dragging => {
                self.dragging = false;
                // One selection event per finished gesture.
                if std::mem::take(&mut self.drag_changed) {
                    self.selection_changed();
                }
            }
            MouseEventKind::ScrollUp => self.scroll(-SCROLL_STEP),
            MouseEventKind::ScrollDown => self.scroll(SCROLL_STEP),
            _ => {}
        }
    }

    fn click(&mut self, x: u16, y: u16) {
        let (width, height) = self.size;

        if let Some(popup) = self.surface().popup() {
            let region = popup_region(width, height, popup.body.len());
            if close_button(region).contains(x, y) {
                self.script.handle(ContentEvent::CloseClicked);
            } else if !region.contains(x, y) {
                self.script.handle(ContentEvent::ScrimClicked);
            }
            return;
        }

        if let Some(anchor) = self.surface().prompt()
            && prompt_region(anchor, self.page().scroll(), width, height)
                .is_some_and(|r| r.contains(x, y))
        {
            self.script.handle(ContentEvent::PromptClicked);
            return;
        }

        if y < text_height(height) {
            let at = self.page().hit(x, y);
            self.key_selection_at = None;
            if self.script.page_mut().begin_selection(at) {
                self.selection_changed();
            }
            self.dragging = true;
            self.drag_changed = false;
        }
    }

    fn selection_changed(&mut self) {
        self.script.handle(ContentEvent::SelectionChanged);
        self.needs_redraw = true;
    }

    fn scroll(&mut self, delta: isize) {
        self.script.page_mut().scroll_by(delta);
        self.needs_redraw = true;
    }

    /// "Ask Sona about this" on the current selection.
    fn ask_from_menu(&mut self) {
        let selection = self.page().selected_text();
        if self.menu.visible_entries(selection.is_some()).is_empty() {
            return;
        }
        let click = MenuClick {
            menu_item_id: ASK_SONA_ID.to_string(),
            selection_text: selection,
            tab_id: Some(self.tab),
        };
        if !self.menu.handle_click(&click, &self.tabs) {
            debug!("Menu click ignored");
        }
    }

    async fn refresh_stats(&mut self) {
        self.stats = Some(self.panel.stats().await);
        self.stats_loaded_at = Some(Instant::now());
        self.needs_redraw = true;
    }

    fn report_save_failures(&mut self) {
        loop {
            match self.save_failures.try_recv() {
                Ok(failure) => {
                    let notice = self.panel.notice(format!(
                        "Could not record \"{}\": {}",
                        failure.concept.text, failure.error
                    ));
                    self.show(notice);
                }
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Save failure reports lagged");
                }
                Err(_) => break,
            }
        }
    }

    fn show(&mut self, notice: Notice) {
        self.notice = Some(notice);
        self.needs_redraw = true;
    }

    async fn new_session(&mut self) {
        match self.panel.new_session().await {
            Ok((stats, notice)) => {
                if self.stats.is_some() {
                    self.stats = Some(stats);
                    self.stats_loaded_at = Some(Instant::now());
                }
                self.show(notice);
            }
            Err(e) => {
                warn!("Failed to start a new session: {e}");
                let notice = self.panel.notice(format!("Could not start a session: {e}"));
                self.show(notice);
            }
        }
    }

    async fn export(&mut self) {
        match self.panel.export().await {
            Ok((outcome, notice)) => {
                if let ExportOutcome::Exported { path, .. } = &outcome {
                    debug!(path = %path.display(), "Export saved");
                }
                self.show(notice);
            }
            Err(e) => {
                warn!("Export failed: {e}");
                let notice = self.panel.notice(format!("Export failed: {e}"));
                self.show(notice);
            }
        }
    }

    fn view_history(&mut self) {
        if let Err(e) = self.panel.view_history() {
            warn!("Failed to open history: {e}");
            let notice = self.panel.notice(format!("Could not open history: {e}"));
            self.show(notice);
        }
    }
}
