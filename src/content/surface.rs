//! What the content surface draws: the prompt and the explanation popup.

use super::page::Anchor;

pub const PROMPT_LABEL: &str = "Ask Sona? 🧠";
pub const POPUP_TITLE: &str = "Sona Explanation";
pub const LOADING_MESSAGE: &str = "Analyzing with Sona...";
pub const FAILURE_MESSAGE: &str =
    "⚠️ Sorry, I couldn't fetch an explanation right now. The backend server might be down.";
pub const RELATED_RESOURCES: [&str; 3] = ["Search YouTube", "Find Papers", "More Examples"];

/// Identifies one opened popup. Never reused within a content surface.
pub type PopupId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupBody {
    Loading,
    /// Formatted explanation markup from the service.
    Explained { html: String },
    /// Fixed warning plus a hint naming the backend address.
    Failed { hint: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupView {
    pub id: PopupId,
    pub selected_text: String,
    pub body: PopupBody,
}

impl PopupView {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.body, PopupBody::Loading)
    }
}

/// Rendering target for transient page UI.
///
/// `render_popup` replaces whatever popup is currently drawn.
pub trait Surface: Send {
    fn show_prompt(&mut self, anchor: Anchor);
    fn hide_prompt(&mut self);
    fn render_popup(&mut self, view: &PopupView);
    fn hide_popup(&mut self);
}

/// Every call a [`RecordingSurface`] received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    ShowPrompt(Anchor),
    HidePrompt,
    RenderPopup(PopupView),
    HidePopup,
}

/// Surface that only remembers what it was asked to draw.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub ops: Vec<SurfaceOp>,
    pub prompt: Option<Anchor>,
    pub popup: Option<PopupView>,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prompt_shown_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SurfaceOp::ShowPrompt(_)))
            .count()
    }
}

impl Surface for RecordingSurface {
    fn show_prompt(&mut self, anchor: Anchor) {
        self.prompt = Some(anchor);
        self.ops.push(SurfaceOp::ShowPrompt(anchor));
    }

    fn hide_prompt(&mut self) {
        self.prompt = None;
        self.ops.push(SurfaceOp::HidePrompt);
    }

    fn render_popup(&mut self, view: &PopupView) {
        self.popup = Some(view.clone());
        self.ops.push(SurfaceOp::RenderPopup(view.clone()));
    }

    fn hide_popup(&mut self) {
        self.popup = None;
        self.ops.push(SurfaceOp::HidePopup);
    }
}
