//! The per-page content surface: watches selections, shows the "ask" prompt,
//! records concepts and drives the explanation popup.
//!
//! [`ContentScript`] is a state machine fed with [`ContentEvent`]s. Timers and
//! explanation replies are spawned as tasks that post events back into the
//! same queue, so all state changes happen on whoever calls
//! [`ContentScript::handle`].

mod page;
mod popup;
mod selection;
mod surface;

pub use page::{Anchor, Page, PageSelection, Rect, StaticPage};
pub use popup::ExplanationPopup;
pub use selection::{PromptState, SelectionDetector, SelectionOutcome};
pub use surface::{
    FAILURE_MESSAGE, LOADING_MESSAGE, POPUP_TITLE, PROMPT_LABEL, PopupBody, PopupId, PopupView,
    RELATED_RESOURCES, RecordingSurface, Surface, SurfaceOp,
};

use crate::config::Config;
use crate::explain::PageContext;
use crate::router::{BackgroundHandle, ContentMessage, ExplanationReply};
use crate::session::Concept;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum ContentEvent {
    /// The page's selection changed. Debounced before it is acted on.
    SelectionChanged,
    DebounceElapsed(u64),
    PromptTimeout(u64),
    PromptClicked,
    /// Popup close button.
    CloseClicked,
    /// Click on the scrim behind the popup.
    ScrimClicked,
    ExplanationReady {
        popup: PopupId,
        reply: ExplanationReply,
    },
    Message(ContentMessage),
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub debounce: Duration,
    pub prompt_timeout: Duration,
    pub page_text_limit: usize,
    /// Second line of the failure popup.
    pub failure_hint: String,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            prompt_timeout: Duration::from_secs(5),
            page_text_limit: 500,
            failure_hint: failure_hint(crate::config::DEFAULT_ENDPOINT),
        }
    }
}

impl ContentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.selection_debounce(),
            prompt_timeout: config.prompt_timeout(),
            page_text_limit: config.page_text_limit,
            failure_hint: failure_hint(&config.endpoint),
        }
    }
}

/// "Make sure the Sona server is running on host:port".
#[must_use]
pub fn failure_hint(endpoint: &str) -> String {
    let address = url::Url::parse(endpoint)
        .ok()
        .and_then(|u| {
            let host = u.host_str()?.to_string();
            Some(match u.port() {
                Some(port) => format!("{host}:{port}"),
                None => host,
            })
        })
        .unwrap_or_else(|| endpoint.to_string());
    format!("Make sure the Sona server is running on {address}")
}

pub struct ContentScript<P, S> {
    page: P,
    surface: S,
    background: BackgroundHandle,
    settings: ContentSettings,
    detector: SelectionDetector,
    popup: ExplanationPopup,
    debounce_seq: u64,
    events: mpsc::UnboundedSender<ContentEvent>,
}

impl<P: Page, S: Surface> ContentScript<P, S> {
    /// Create a content surface and the queue its events arrive on.
    pub fn new(
        page: P,
        surface: S,
        background: BackgroundHandle,
        settings: ContentSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ContentEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let script = Self {
            page,
            surface,
            background,
            settings,
            detector: SelectionDetector::new(),
            popup: ExplanationPopup::new(),
            debounce_seq: 0,
            events,
        };
        (script, rx)
    }

    /// Sender for posting events into this surface's queue.
    #[must_use]
    pub fn events(&self) -> mpsc::UnboundedSender<ContentEvent> {
        self.events.clone()
    }

    /// Forward messages addressed to this tab into the event queue.
    pub fn attach(&self, mut messages: mpsc::UnboundedReceiver<ContentMessage>) -> JoinHandle<()> {
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                if events.send(ContentEvent::Message(message)).is_err() {
                    break;
                }
            }
        })
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn prompt_state(&self) -> &PromptState {
        self.detector.state()
    }

    pub fn popup(&self) -> Option<&PopupView> {
        self.popup.current()
    }

    /// Handle events until the queue closes or `cancel` fires.
    pub async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<ContentEvent>,
        cancel: CancellationToken,
    ) -> Self {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }
        self
    }

    pub fn handle(&mut self, event: ContentEvent) {
        match event {
            ContentEvent::SelectionChanged => {
                self.debounce_seq += 1;
                self.schedule(
                    self.settings.debounce,
                    ContentEvent::DebounceElapsed(self.debounce_seq),
                );
            }
            ContentEvent::DebounceElapsed(seq) => {
                if seq == self.debounce_seq {
                    self.selection_settled();
                }
            }
            ContentEvent::PromptTimeout(generation) => {
                if self.detector.timeout(generation) {
                    self.surface.hide_prompt();
                }
            }
            ContentEvent::PromptClicked => {
                if let Some(text) = self.detector.click() {
                    self.surface.hide_prompt();
                    self.open_popup(text);
                }
            }
            ContentEvent::CloseClicked | ContentEvent::ScrimClicked => self.close_popup(),
            ContentEvent::ExplanationReady { popup, reply } => {
                match self
                    .popup
                    .resolve(popup, &reply, &self.settings.failure_hint)
                {
                    Some(view) => self.surface.render_popup(view),
                    None => tracing::debug!(popup, "Dropping reply for a popup that is gone"),
                }
            }
            ContentEvent::Message(ContentMessage::ExplainText { selected_text }) => {
                if self.detector.dismiss() {
                    self.surface.hide_prompt();
                }
                self.open_popup(selected_text);
            }
        }
    }

    fn selection_settled(&mut self) {
        match self.detector.observe(self.page.selection()) {
            SelectionOutcome::Prompted {
                text,
                anchor,
                generation,
            } => {
                self.close_popup();
                self.surface.show_prompt(anchor);
                self.schedule(
                    self.settings.prompt_timeout,
                    ContentEvent::PromptTimeout(generation),
                );
                self.background
                    .save_to_session(self.page.url(), Concept::now(text));
            }
            SelectionOutcome::Cleared => self.surface.hide_prompt(),
            SelectionOutcome::Unchanged => {}
        }
    }

    fn open_popup(&mut self, text: String) {
        let context = PageContext::new(
            self.page.url(),
            self.page.title(),
            &self.page.body_text(),
            self.settings.page_text_limit,
        );
        let request = self.background.request_explanation(text.clone(), context);

        let view = self.popup.open(text);
        let id = view.id;
        self.surface.render_popup(view);

        let events = self.events.clone();
        tokio::spawn(async move {
            let reply = request.await;
            let _ = events.send(ContentEvent::ExplanationReady { popup: id, reply });
        });
    }

    fn close_popup(&mut self) {
        if self.popup.close() {
            self.surface.hide_popup();
        }
    }

    fn schedule(&self, delay: Duration, event: ContentEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event);
        });
    }
}
