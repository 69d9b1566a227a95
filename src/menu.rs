//! The "Ask Sona about this" context-menu entry.

use crate::router::{ContentMessage, TabId, TabRegistry};

pub const ASK_SONA_ID: &str = "askSona";
pub const ASK_SONA_TITLE: &str = "Ask Sona about this";

/// When a menu entry is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuContext {
    /// Only while text is selected.
    Selection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub id: &'static str,
    pub title: &'static str,
    pub contexts: &'static [MenuContext],
}

/// A click on a menu entry, as reported by the host.
#[derive(Debug, Clone, Default)]
pub struct MenuClick {
    pub menu_item_id: String,
    pub selection_text: Option<String>,
    pub tab_id: Option<TabId>,
}

#[derive(Debug)]
pub struct ContextMenu {
    entries: Vec<MenuEntry>,
}

impl Default for ContextMenu {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextMenu {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![MenuEntry {
                id: ASK_SONA_ID,
                title: ASK_SONA_TITLE,
                contexts: &[MenuContext::Selection],
            }],
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    /// Entries to show given whether the user has text selected.
    #[must_use]
    pub fn visible_entries(&self, has_selection: bool) -> Vec<&MenuEntry> {
        self.entries
            .iter()
            .filter(|e| has_selection && e.contexts.contains(&MenuContext::Selection))
            .collect()
    }

    /// Route a click to the clicked tab's content surface. Returns true when an
    /// explain request was delivered.
    pub fn handle_click(&self, click: &MenuClick, tabs: &TabRegistry) -> bool {
        if click.menu_item_id != ASK_SONA_ID {
            tracing::debug!(id = %click.menu_item_id, "Ignoring unknown menu item");
            return false;
        }

        let Some(text) = click
            .selection_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            tracing::debug!("Menu clicked without a selection");
            return false;
        };

        let message = ContentMessage::ExplainText {
            selected_text: text.to_string(),
        };
        match click.tab_id {
            Some(id) => tabs.send_to_tab(id, message),
            None => tabs.send_to_active(message),
        }
    }
}
