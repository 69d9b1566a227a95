use super::ContentMessage;
use std::collections::HashMap;
use tokio::sync::mpsc;

pub type TabId = u32;

/// Content-surface channels by tab, plus which tab is active.
#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: HashMap<TabId, mpsc::UnboundedSender<ContentMessage>>,
    active: Option<TabId>,
    next_id: TabId,
}

impl TabRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a content surface. The new tab becomes active.
    pub fn register(&mut self, tx: mpsc::UnboundedSender<ContentMessage>) -> TabId {
        self.next_id += 1;
        let id = self.next_id;
        self.tabs.insert(id, tx);
        self.active = Some(id);
        id
    }

    pub fn unregister(&mut self, id: TabId) {
        self.tabs.remove(&id);
        if self.active == Some(id) {
            self.active = None;
        }
    }

    /// Make `id` the active tab. Returns false for unknown tabs.
    pub fn activate(&mut self, id: TabId) -> bool {
        if self.tabs.contains_key(&id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn active(&self) -> Option<TabId> {
        self.active
    }

    /// Deliver a message to one tab. Returns false if it could not be delivered.
    pub fn send_to_tab(&self, id: TabId, message: ContentMessage) -> bool {
        match self.tabs.get(&id) {
            Some(tx) => tx.send(message).is_ok(),
            None => {
                tracing::debug!(tab = id, "No content surface for tab");
                false
            }
        }
    }

    pub fn send_to_active(&self, message: ContentMessage) -> bool {
        self.active.is_some_and(|id| self.send_to_tab(id, message))
    }
}
