//! Idle/Prompting state machine for the "ask" prompt.

use super::page::{Anchor, PageSelection};

#[derive(Debug, Clone, PartialEq)]
pub enum PromptState {
    Idle,
    Prompting {
        text: String,
        anchor: Anchor,
        /// Bumped on every new prompt so a stale timeout cannot hide a newer one.
        generation: u64,
    },
}

/// Result of feeding a settled selection into the detector.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// A prompt should be (re)drawn for `text`.
    Prompted {
        text: String,
        anchor: Anchor,
        generation: u64,
    },
    /// The visible prompt should be removed.
    Cleared,
    /// Nothing to do.
    Unchanged,
}

#[derive(Debug)]
pub struct SelectionDetector {
    state: PromptState,
    generation: u64,
}

impl Default for SelectionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionDetector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PromptState::Idle,
            generation: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &PromptState {
        &self.state
    }

    #[must_use]
    pub fn is_prompting(&self) -> bool {
        matches!(self.state, PromptState::Prompting { .. })
    }

    /// Apply a settled selection. Non-empty trimmed text always yields a new
    /// prompt, even when one is already showing.
    pub fn observe(&mut self, selection: Option<PageSelection>) -> SelectionOutcome {
        let selected = selection.and_then(|s| {
            let text = s.text.trim();
            (!text.is_empty()).then(|| (text.to_string(), Anchor::below(&s.bounds)))
        });

        match selected {
            Some((text, anchor)) => {
                self.generation += 1;
                self.state = PromptState::Prompting {
                    text: text.clone(),
                    anchor,
                    generation: self.generation,
                };
                SelectionOutcome::Prompted {
                    text,
                    anchor,
                    generation: self.generation,
                }
            }
            None if self.is_prompting() => {
                self.state = PromptState::Idle;
                SelectionOutcome::Cleared
            }
            None => SelectionOutcome::Unchanged,
        }
    }

    /// Prompt timer fired. Returns true if that prompt was still showing.
    pub fn timeout(&mut self, generation: u64) -> bool {
        match self.state {
            PromptState::Prompting { generation: g, .. } if g == generation => {
                self.state = PromptState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Prompt clicked: returns the prompted text and goes idle.
    pub fn click(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.state, PromptState::Idle) {
            PromptState::Prompting { text, .. } => Some(text),
            PromptState::Idle => None,
        }
    }

    /// Drop any prompt. Returns true if one was showing.
    pub fn dismiss(&mut self) -> bool {
        let was_prompting = self.is_prompting();
        self.state = PromptState::Idle;
        was_prompting
    }
}
