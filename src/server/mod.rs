//! HTTP backend the explanation client talks to.
//!
//! Routes:
//! - POST /api/explain                - Explain a selection
//! - POST /api/session                - Create a session record
//! - GET  /api/session/{id}/export    - Placeholder export
//! - POST /api/search                 - Related resources (mock)
//! - GET  /health                     - Liveness

mod explain;

pub use explain::generate_explanation;

use crate::explain::PageContext;
use axum::{
    Json, Router,
    extract::{Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Local;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::ToSocketAddrs;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

pub const SERVICE_NAME: &str = "Sona Research Assistant API";
const DEFAULT_SESSION_TITLE: &str = "Research Session";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExplainBody {
    text: String,
    context: PageContext,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionBody {
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchBody {
    query: String,
}

/// Build the application router.
pub fn router() -> Router {
    Router::new()
        .route("/api/explain", post(explain))
        .route("/api/session", post(create_session))
        .route("/api/session/{id}/export", get(export_session))
        .route("/api/search", post(search))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
}

/// Serve until `cancel` fires.
pub async fn serve(addr: impl ToSocketAddrs, cancel: CancellationToken) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("{SERVICE_NAME} listening on {}", listener.local_addr()?);

    axum::serve(listener, router())
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}

fn iso_now() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({"error": message.into(), "success": false})),
    )
        .into_response()
}

fn rejected(rejection: &JsonRejection) -> Response {
    warn!("Rejected request body: {}", rejection.body_text());
    failure(StatusCode::BAD_REQUEST, rejection.body_text())
}

/// POST /api/explain
async fn explain(body: Result<Json<ExplainBody>, JsonRejection>) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(&rejection),
    };

    if body.text.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "No text provided");
    }

    debug!(chars = body.text.chars().count(), domain = %body.context.domain, "Explaining");
    let explanation = match generate_explanation(&body.text, &body.context) {
        Ok(explanation) => explanation,
        Err(e) => {
            warn!("Failed to render explanation: {e}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate explanation");
        }
    };

    Json(json!({
        "explanation": explanation,
        "success": true,
        "timestamp": iso_now(),
    }))
    .into_response()
}

/// POST /api/session
async fn create_session(body: Result<Json<SessionBody>, JsonRejection>) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(&rejection),
    };

    let now = Local::now();
    let session = json!({
        "id": format!("session_{}", now.format("%Y%m%d_%H%M%S")),
        "timestamp": iso_now(),
        "concepts": [],
        "urls": [],
        "title": body.title.unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_string()),
    });
    info!("Created session {}", session["id"]);

    Json(json!({"session": session, "success": true})).into_response()
}

/// GET /api/session/{id}/export
async fn export_session(Path(session_id): Path<String>) -> impl IntoResponse {
    let export = json!({
        "session_id": session_id,
        "title": format!("Research Session Export - {}", Local::now().format("%Y-%m-%d")),
        "summary": "This is a mock export. In the full version, this will contain all your research concepts, visited URLs, and insights.",
        "concepts_explored": [],
        "urls_visited": [],
        "export_timestamp": iso_now(),
    });

    Json(json!({"export": export, "success": true}))
}

/// POST /api/search
async fn search(body: Result<Json<SearchBody>, JsonRejection>) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(&rejection),
    };

    let query = body.query;
    if query.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "No query provided");
    }

    let results = json!({
        "papers": [
            {"title": format!("Research paper about {query}"), "url": "https://example.com/paper1"},
            {"title": format!("Advanced studies in {query}"), "url": "https://example.com/paper2"},
        ],
        "videos": [
            {"title": format!("{query} explained"), "url": "https://youtube.com/watch?v=example1"},
            {"title": format!("Introduction to {query}"), "url": "https://youtube.com/watch?v=example2"},
        ],
    });

    Json(json!({"results": results, "success": true})).into_response()
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": iso_now(),
    }))
}
