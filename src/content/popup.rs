//! The single explanation popup and its loading/explained/failed states.

use super::surface::{PopupBody, PopupId, PopupView};
use crate::router::ExplanationReply;

#[derive(Debug, Default)]
pub struct ExplanationPopup {
    current: Option<PopupView>,
    next_id: PopupId,
}

impl ExplanationPopup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<&PopupView> {
        self.current.as_ref()
    }

    /// Open a loading popup for `text`, replacing any existing one.
    pub fn open(&mut self, text: impl Into<String>) -> &PopupView {
        self.next_id += 1;
        self.current.insert(PopupView {
            id: self.next_id,
            selected_text: text.into(),
            body: PopupBody::Loading,
        })
    }

    /// Apply a reply to popup `id`.
    ///
    /// Returns the updated view, or `None` when that popup has been closed or
    /// replaced since the request was made, or has already been resolved.
    pub fn resolve(
        &mut self,
        id: PopupId,
        reply: &ExplanationReply,
        failure_hint: &str,
    ) -> Option<&PopupView> {
        let view = self.current.as_mut().filter(|v| v.id == id && v.is_loading())?;

        view.body = match reply {
            Ok(html) => PopupBody::Explained { html: html.clone() },
            Err(_) => PopupBody::Failed {
                hint: failure_hint.to_string(),
            },
        };
        Some(&*view)
    }

    /// Close the popup. Returns true if one was open.
    pub fn close(&mut self) -> bool {
        self.current.take().is_some()
    }
}
