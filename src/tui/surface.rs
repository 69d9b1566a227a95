//! Prompt and popup state for the terminal, pre-rendered to plain text.

use crate::content::{
    Anchor, FAILURE_MESSAGE, LOADING_MESSAGE, PopupBody, PopupId, PopupView, RELATED_RESOURCES,
    Surface,
};

/// A popup laid out as text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPopup {
    pub id: PopupId,
    pub selected_text: String,
    pub body: Vec<String>,
    pub loading: bool,
}

#[derive(Debug, Default)]
pub struct TerminalSurface {
    text_width: usize,
    prompt: Option<Anchor>,
    popup: Option<RenderedPopup>,
    dirty: bool,
}

impl TerminalSurface {
    /// `text_width` is the inner width of the popup box.
    #[must_use]
    pub fn new(text_width: usize) -> Self {
        Self {
            text_width: text_width.max(10),
            ..Self::default()
        }
    }

    /// Applies to popups rendered from now on.
    pub fn set_text_width(&mut self, text_width: usize) {
        self.text_width = text_width.max(10);
    }

    pub fn prompt(&self) -> Option<Anchor> {
        self.prompt
    }

    pub fn popup(&self) -> Option<&RenderedPopup> {
        self.popup.as_ref()
    }

    /// True once after anything changed.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl Surface for TerminalSurface {
    fn show_prompt(&mut self, anchor: Anchor) {
        self.prompt = Some(anchor);
        self.dirty = true;
    }

    fn hide_prompt(&mut self) {
        self.prompt = None;
        self.dirty = true;
    }

    fn render_popup(&mut self, view: &PopupView) {
        self.popup = Some(RenderedPopup {
            id: view.id,
            selected_text: view.selected_text.clone(),
            body: popup_lines(&view.body, self.text_width),
            loading: view.is_loading(),
        });
        self.dirty = true;
    }

    fn hide_popup(&mut self) {
        self.popup = None;
        self.dirty = true;
    }
}

/// Body text of a popup, explanation markup rendered as plain text.
pub fn popup_lines(body: &PopupBody, width: usize) -> Vec<String> {
    let mut lines = match body {
        PopupBody::Loading => return vec![LOADING_MESSAGE.to_string()],
        PopupBody::Explained { html } => html_to_lines(html, width),
        PopupBody::Failed { hint } => {
            let mut lines = crate::tui::page::wrap_rows(FAILURE_MESSAGE, width);
            lines.extend(crate::tui::page::wrap_rows(hint, width));
            lines
        }
    };
    lines.push(String::new());
    lines.push(RELATED_RESOURCES.join(" | "));
    lines
}

fn html_to_lines(html: &str, width: usize) -> Vec<String> {
    match html2text::from_read(html.as_bytes(), width) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(e) => {
            tracing::warn!("Failed to render explanation markup: {e}");
            crate::tui::page::wrap_rows(html, width)
        }
    }
}
