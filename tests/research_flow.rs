//! End-to-end flows: page selection through the background service into the
//! persisted session, explanations over HTTP, and the popup panel commands.

use sona::content::{
    ContentEvent, ContentScript, ContentSettings, FAILURE_MESSAGE, PopupBody, RecordingSurface,
    StaticPage, failure_hint,
};
use sona::explain::ExplanationClient;
use sona::popup::{
    DirDownloads, ExportOutcome, NEW_SESSION_NOTICE, NOTHING_TO_EXPORT_NOTICE, PopupPanel,
    TabOpener,
};
use sona::router::{Background, BackgroundHandle, ContentMessage};
use sona::session::{Concept, SessionExport, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

type Script = ContentScript<StaticPage, RecordingSurface>;

struct NoOpener;

impl TabOpener for NoOpener {
    fn open(&self, _url: &str) -> std::io::Result<()> {
        Ok(())
    }
}

fn settings(endpoint: &str) -> ContentSettings {
    ContentSettings {
        debounce: Duration::from_millis(20),
        prompt_timeout: Duration::from_secs(5),
        page_text_limit: 500,
        failure_hint: failure_hint(endpoint),
    }
}

fn background(store: &Arc<SessionStore>, endpoint: &str, timeout: Duration) -> BackgroundHandle {
    let client = ExplanationClient::new(endpoint, timeout).unwrap();
    let (background, handle) = Background::new(Arc::clone(store), Arc::new(client));
    background.spawn();
    handle
}

fn script(handle: BackgroundHandle, endpoint: &str) -> (Script, mpsc::UnboundedReceiver<ContentEvent>) {
    let page = StaticPage::new(
        "https://notes.example/thermo",
        "Thermodynamics",
        "Entropy is a measure of disorder.",
    );
    ContentScript::new(page, RecordingSurface::new(), handle, settings(endpoint))
}

/// Handle events for `window` of real time.
async fn run_for(script: &mut Script, rx: &mut mpsc::UnboundedReceiver<ContentEvent>, window: Duration) {
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        script.handle(event);
    }
}

/// Handle events until the popup stops loading, or fail after `limit`.
async fn until_resolved(script: &mut Script, rx: &mut mpsc::UnboundedReceiver<ContentEvent>, limit: Duration) {
    tokio::time::timeout(limit, async {
        while script.popup().is_some_and(|p| p.is_loading()) {
            let event = rx.recv().await.expect("event queue open");
            script.handle(event);
        }
    })
    .await
    .expect("popup left loading");
}

async fn serve_backend() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, sona::server::router()).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn selections_accumulate_in_persisted_session() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("storage.json");
    let store = Arc::new(SessionStore::open(&path));
    let endpoint = "http://127.0.0.1:1";
    let (mut script, mut rx) = script(background(&store, endpoint, Duration::from_secs(1)), endpoint);

    let words = ["entropy", "enthalpy", "heat engine", "Carnot cycle", "entropy"];
    for word in words {
        script.page_mut().select(format!("  {word}\n"));
        script.handle(ContentEvent::SelectionChanged);
        run_for(&mut script, &mut rx, Duration::from_millis(80)).await;
    }
    run_for(&mut script, &mut rx, Duration::from_millis(100)).await;

    let reopened = SessionStore::open(&path).load().await;
    assert_eq!(reopened.concepts.len(), words.len());
    assert_eq!(reopened.urls.len(), words.len());
    let texts: Vec<&str> = reopened.concepts.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, words);
}

#[tokio::test]
async fn first_run_load_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::open(&dir.path().join("missing/storage.json"));

    let session = store.load().await;
    assert!(session.concepts.is_empty());
    assert!(session.urls.is_empty());
    assert!(session.timestamp > 0);
    assert!(session.id.starts_with("session_"));
}

#[tokio::test]
async fn export_empty_then_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SessionStore::open(&dir.path().join("storage.json")));
    let downloads = dir.path().join("downloads");
    let panel = PopupPanel::new(
        Arc::clone(&store),
        Arc::new(DirDownloads::new(&downloads)),
        Arc::new(NoOpener),
        "file:///history.html",
    );

    let (outcome, notice) = panel.export().await.unwrap();
    assert_eq!(outcome, ExportOutcome::NothingToExport);
    assert_eq!(notice.message, NOTHING_TO_EXPORT_NOTICE);
    assert!(!downloads.exists());

    for (i, text) in ["qubit", "superposition", "qubit"].iter().enumerate() {
        store
            .append_concept(Concept::new(*text, 1_700_000_000_000 + i as i64), &format!("https://q.example/{i}"))
            .await
            .unwrap();
    }
    let session = store.load().await;

    let (outcome, _) = panel.export().await.unwrap();
    let ExportOutcome::Exported { path, .. } = outcome else {
        panic!("expected an export");
    };
    let parsed: SessionExport = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(parsed.session_id, session.id);
    assert_eq!(parsed.summary.total_concepts, 3);
    assert_eq!(parsed.summary.total_urls, 3);
    assert_eq!(parsed.summary.concepts, session.concepts);
    assert_eq!(parsed.summary.urls, session.urls);
}

#[tokio::test]
async fn unreachable_endpoint_shows_warning() {
    let store = Arc::new(SessionStore::in_memory());
    let endpoint = "http://127.0.0.1:1";
    let (mut script, mut rx) = script(background(&store, endpoint, Duration::from_secs(2)), endpoint);

    script.handle(ContentEvent::Message(ContentMessage::ExplainText {
        selected_text: "entropy".to_string(),
    }));
    assert!(script.popup().unwrap().is_loading());

    until_resolved(&mut script, &mut rx, Duration::from_secs(5)).await;
    let popup = script.surface().popup.as_ref().unwrap();
    assert_eq!(
        popup.body,
        PopupBody::Failed {
            hint: "Make sure the Sona server is running on 127.0.0.1:1".to_string()
        }
    );
    assert!(FAILURE_MESSAGE.contains("backend server might be down"));
}

#[tokio::test]
async fn explanation_from_local_backend() {
    let endpoint = serve_backend().await;
    let store = Arc::new(SessionStore::in_memory());
    let (mut script, mut rx) = script(background(&store, &endpoint, Duration::from_secs(5)), &endpoint);

    script.page_mut().select("Machine learning");
    script.handle(ContentEvent::SelectionChanged);
    run_for(&mut script, &mut rx, Duration::from_millis(60)).await;
    assert!(script.surface().prompt.is_some());

    script.handle(ContentEvent::PromptClicked);
    until_resolved(&mut script, &mut rx, Duration::from_secs(5)).await;

    let Some(PopupBody::Explained { html }) = script.popup().map(|p| p.body.clone()) else {
        panic!("expected an explanation");
    };
    assert!(html.starts_with("Machine Learning is a subset of artificial intelligence"));
    assert_eq!(store.load().await.concepts[0].text, "Machine learning");
}

#[tokio::test]
async fn backend_escapes_selected_markup() {
    let endpoint = serve_backend().await;
    let store = Arc::new(SessionStore::in_memory());
    let (mut script, mut rx) = script(background(&store, &endpoint, Duration::from_secs(5)), &endpoint);

    script.handle(ContentEvent::Message(ContentMessage::ExplainText {
        selected_text: "<b>bold claim</b>".to_string(),
    }));
    until_resolved(&mut script, &mut rx, Duration::from_secs(5)).await;

    let Some(PopupBody::Explained { html }) = script.popup().map(|p| p.body.clone()) else {
        panic!("expected an explanation");
    };
    assert!(html.contains("&lt;b&gt;bold claim&lt;"));
    assert!(!html.contains("<b>"));
    assert!(html.contains("mentioned on notes.example"));
}

#[tokio::test]
async fn new_session_replaces_identity() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SessionStore::open(&dir.path().join("storage.json")));
    store
        .append_concept(Concept::now("entropy"), "https://notes.example")
        .await
        .unwrap();
    let before = store.load().await;

    tokio::time::sleep(Duration::from_millis(5)).await;
    let panel = PopupPanel::new(
        Arc::clone(&store),
        Arc::new(DirDownloads::new(dir.path())),
        Arc::new(NoOpener),
        "file:///history.html",
    );
    let (stats, notice) = panel.new_session().await.unwrap();

    assert_eq!(notice.message, NEW_SESSION_NOTICE);
    let after = store.load().await;
    assert_ne!(after.id, before.id);
    assert!(after.timestamp > before.timestamp);
    assert!(after.concepts.is_empty());
    assert!(after.urls.is_empty());
    assert_eq!(stats.session_id, after.id);
}

#[tokio::test]
async fn select_then_deselect_is_ignored() {
    let store = Arc::new(SessionStore::in_memory());
    let endpoint = "http://127.0.0.1:1";
    let (mut script, mut rx) = script(background(&store, endpoint, Duration::from_secs(1)), endpoint);

    script.page_mut().select("fleeting");
    script.handle(ContentEvent::SelectionChanged);
    script.page_mut().clear_selection();
    script.handle(ContentEvent::SelectionChanged);
    run_for(&mut script, &mut rx, Duration::from_millis(100)).await;

    assert_eq!(script.surface().prompt_shown_count(), 0);
    assert!(store.load().await.concepts.is_empty());
}
