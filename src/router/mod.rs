//! Message routing between the page surfaces and the background service.
//!
//! Content surfaces talk to the background over one typed channel: a request
//! that expects exactly one reply (`GetExplanation`) or a notification that
//! expects none (`SaveToSession`). The background talks back to a tab's content
//! surface through the [`TabRegistry`].

mod tabs;

pub use tabs::{TabId, TabRegistry};

use crate::explain::{ExplainError, Explainer, PageContext};
use crate::session::{Concept, SessionStore};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Outcome delivered to whoever asked for an explanation.
pub type ExplanationReply = Result<String, ExplainError>;

/// Messages handled by the background service.
#[derive(Debug)]
pub enum BackgroundMessage {
    /// Request/response: exactly one reply is sent on `reply`.
    GetExplanation {
        text: String,
        context: PageContext,
        reply: oneshot::Sender<ExplanationReply>,
    },
    /// Notify-only: record a highlighted concept and the page it came from.
    SaveToSession { url: String, concept: Concept },
}

/// Messages delivered to a tab's content surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentMessage {
    /// Open the explanation popup for this text, as if the prompt was clicked.
    ExplainText { selected_text: String },
}

/// A concept the background could not record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFailure {
    pub concept: Concept,
    pub url: String,
    pub error: String,
}

/// Unreported failures kept per subscriber before the oldest are dropped.
const FAILURE_BACKLOG: usize = 16;

/// Cloneable sender side of the background channel.
#[derive(Debug, Clone)]
pub struct BackgroundHandle {
    tx: mpsc::UnboundedSender<BackgroundMessage>,
    failures: broadcast::Sender<SaveFailure>,
}

impl BackgroundHandle {
    /// Ask for an explanation. The returned future resolves once the background
    /// replies, or to [`ExplainError::ChannelClosed`] if it never will.
    pub fn request_explanation(
        &self,
        text: impl Into<String>,
        context: PageContext,
    ) -> impl Future<Output = ExplanationReply> + Send + 'static {
        let (reply, rx) = oneshot::channel();
        let sent = self
            .tx
            .send(BackgroundMessage::GetExplanation {
                text: text.into(),
                context,
                reply,
            })
            .is_ok();

        async move {
            if !sent {
                return Err(ExplainError::ChannelClosed);
            }
            rx.await.unwrap_or(Err(ExplainError::ChannelClosed))
        }
    }

    /// Fire-and-forget session append.
    pub fn save_to_session(&self, url: impl Into<String>, concept: Concept) {
        let message = BackgroundMessage::SaveToSession {
            url: url.into(),
            concept,
        };
        if self.tx.send(message).is_err() {
            tracing::warn!("Background is gone, concept not recorded");
        }
    }

    /// Session writes that failed from now on. Surfaces show these to the
    /// user, since nothing else reports a dropped append.
    #[must_use]
    pub fn failures(&self) -> broadcast::Receiver<SaveFailure> {
        self.failures.subscribe()
    }
}

/// The background service: owns the explainer and applies session writes.
pub struct Background {
    store: Arc<SessionStore>,
    explainer: Arc<dyn Explainer>,
    rx: mpsc::UnboundedReceiver<BackgroundMessage>,
    failures: broadcast::Sender<SaveFailure>,
    cancel: CancellationToken,
}

impl Background {
    pub fn new(
        store: Arc<SessionStore>,
        explainer: Arc<dyn Explainer>,
    ) -> (Self, BackgroundHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (failures, _) = broadcast::channel(FAILURE_BACKLOG);
        let background = Self {
            store,
            explainer,
            rx,
            failures: failures.clone(),
            cancel: CancellationToken::new(),
        };
        (background, BackgroundHandle { tx, failures })
    }

    /// Stop the service when `token` is cancelled.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process messages until every handle is dropped or the service is
    /// cancelled.
    ///
    /// Session writes are applied in arrival order before the next message is
    /// taken. Explanation requests run on their own tasks and reply whenever
    /// they finish, so replies may arrive out of order. Messages already
    /// queued when the service is cancelled are still applied.
    pub async fn run(mut self) {
        loop {
            let message = tokio::select! {
                biased;
                message = self.rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
                () = self.cancel.cancelled() => break,
            };
            self.dispatch(message).await;
        }
        tracing::debug!("Background stopped");
    }

    async fn dispatch(&self, message: BackgroundMessage) {
        match message {
            BackgroundMessage::GetExplanation {
                text,
                context,
                reply,
            } => {
                let explainer = Arc::clone(&self.explainer);
                tokio::spawn(async move {
                    let result = explainer.explain(&text, &context).await;
                    if let Err(e) = &result {
                        tracing::warn!("Explanation failed: {e}");
                    }
                    if reply.send(result).is_err() {
                        tracing::debug!("Explanation requester went away before the reply");
                    }
                });
            }
            BackgroundMessage::SaveToSession { url, concept } => {
                if let Err(e) = self.store.append_concept(concept.clone(), &url).await {
                    tracing::error!("Failed to record concept: {e}");
                    // No subscribers is fine; the error is logged above.
                    let _ = self.failures.send(SaveFailure {
                        concept,
                        url,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{KeyValueStorage, StorageError};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Echoes the text back after an optional per-text delay.
    struct EchoExplainer;

    #[async_trait]
    impl Explainer for EchoExplainer {
        async fn explain(&self, text: &str, context: &PageContext) -> ExplanationReply {
            if let Some(ms) = text.strip_prefix("slow:") {
                let ms: u64 = ms.parse().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            if text == "fail" {
                return Err(ExplainError::Malformed("nope".into()));
            }
            Ok(format!("{text}@{}", context.domain))
        }
    }

    fn start() -> (Arc<SessionStore>, BackgroundHandle) {
        let store = Arc::new(SessionStore::in_memory());
        let (background, handle) = Background::new(Arc::clone(&store), Arc::new(EchoExplainer));
        background.spawn();
        (store, handle)
    }

    fn ctx() -> PageContext {
        PageContext::new("https://docs.example/page", "Docs", "", 500)
    }

    #[tokio::test]
    async fn test_explanation_round_trip() {
        let (_store, handle) = start();
        let reply = handle.request_explanation("entropy", ctx()).await;
        assert_eq!(reply.unwrap(), "entropy@docs.example");
    }

    #[tokio::test]
    async fn test_explanation_failure_is_delivered() {
        let (_store, handle) = start();
        let reply = handle.request_explanation("fail", ctx()).await;
        assert!(matches!(reply, Err(ExplainError::Malformed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replies_may_arrive_out_of_order() {
        let (_store, handle) = start();
        let slow = tokio::spawn(handle.request_explanation("slow:500", ctx()));
        let fast = tokio::spawn(handle.request_explanation("slow:10", ctx()));

        let fast = fast.await.unwrap().unwrap();
        assert!(!slow.is_finished());
        assert_eq!(fast, "slow:10@docs.example");
        assert_eq!(slow.await.unwrap().unwrap(), "slow:500@docs.example");
    }

    #[tokio::test]
    async fn test_saves_apply_in_order() {
        let (store, handle) = start();
        for i in 0..10 {
            handle.save_to_session(format!("https://p.example/{i}"), Concept::new(format!("c{i}"), i));
        }
        // Saves are applied before the next message is taken, so a reply to a
        // later request means every earlier save has landed.
        handle.request_explanation("barrier", ctx()).await.unwrap();

        let session = store.load().await;
        assert_eq!(session.concepts.len(), 10);
        assert_eq!(session.urls.len(), 10);
        assert_eq!(session.concepts[3].text, "c3");
        assert_eq!(session.urls[9], "https://p.example/9");
    }

    #[tokio::test]
    async fn test_closed_background_fails_request() {
        let store = Arc::new(SessionStore::in_memory());
        let (background, handle) = Background::new(store, Arc::new(EchoExplainer));
        drop(background);

        let reply = handle.request_explanation("x", ctx()).await;
        assert!(matches!(reply, Err(ExplainError::ChannelClosed)));
        // Notifications to a closed background are dropped quietly.
        handle.save_to_session("u", Concept::new("x", 1));
    }

    struct UnreadableStorage;

    #[async_trait]
    impl KeyValueStorage for UnreadableStorage {
        async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk gone")))
        }

        async fn set(&self, _key: &str, _value: serde_json::Value) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_save_is_reported() {
        let store = Arc::new(SessionStore::new(Arc::new(UnreadableStorage)));
        let (background, handle) = Background::new(store, Arc::new(EchoExplainer));
        let mut failures = handle.failures();
        background.spawn();

        handle.save_to_session("https://p.example/1", Concept::new("entropy", 7));
        let failure = failures.recv().await.unwrap();

        assert_eq!(failure.concept, Concept::new("entropy", 7));
        assert_eq!(failure.url, "https://p.example/1");
        assert!(failure.error.contains("disk gone"));
    }

    #[tokio::test]
    async fn test_queued_saves_survive_cancel() {
        let store = Arc::new(SessionStore::in_memory());
        let token = CancellationToken::new();
        let (background, handle) = Background::new(Arc::clone(&store), Arc::new(EchoExplainer));
        for i in 0..3 {
            handle.save_to_session("u", Concept::new(format!("c{i}"), i));
        }
        token.cancel();

        background.with_cancel(token).spawn().await.unwrap();
        assert_eq!(store.load().await.concepts.len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_stops_background() {
        let store = Arc::new(SessionStore::in_memory());
        let token = CancellationToken::new();
        let (background, handle) = Background::new(store, Arc::new(EchoExplainer));
        let task = background.with_cancel(token.clone()).spawn();

        token.cancel();
        task.await.unwrap();
        let reply = handle.request_explanation("x", ctx()).await;
        assert!(matches!(reply, Err(ExplainError::ChannelClosed)));
    }
}
