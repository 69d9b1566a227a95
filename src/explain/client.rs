//! HTTP client for the explanation service.

use super::{ExplainError, Explainer, ExplanationRequest, PageContext};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Deserialize;
use std::time::Duration;

/// Path appended to the configured endpoint.
pub const EXPLAIN_PATH: &str = "/api/explain";
/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ExplanationResponse {
    explanation: Option<String>,
}

/// Single-shot client: one POST per request, no retries.
#[derive(Debug, Clone)]
pub struct ExplanationClient {
    client: reqwest::Client,
    base_url: String,
}

impl ExplanationClient {
    /// Create a client for the service at `base_url`. Fails if the HTTP
    /// client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ExplainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ExplainError> {
        Self::new(&config.endpoint, config.request_timeout())
    }

    /// Full URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}{EXPLAIN_PATH}", self.base_url)
    }
}

#[async_trait]
impl Explainer for ExplanationClient {
    async fn explain(&self, text: &str, context: &PageContext) -> Result<String, ExplainError> {
        let url = self.endpoint();
        let body = ExplanationRequest {
            text: text.to_string(),
            context: context.clone(),
        };

        tracing::debug!(%url, chars = text.chars().count(), "Requesting explanation");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ExplainError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: ExplanationResponse = serde_json::from_str(&text)
            .map_err(|e| ExplainError::Malformed(format!("{e}\nBody: {text}")))?;

        parsed
            .explanation
            .ok_or_else(|| ExplainError::Malformed("missing `explanation` field".to_string()))
    }
}

/// Pull a readable message out of an error body.
///
/// Handles `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"message": "..."}`; anything else is returned as-is.
fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };

    if let Some(error) = json.get("error") {
        if let Some(msg) = error.as_str() {
            return msg.to_string();
        }
        if let Some(msg) = error.get("message").and_then(|v| v.as_str()) {
            return msg.to_string();
        }
    }

    if let Some(msg) = json.get("message").and_then(|v| v.as_str()) {
        return msg.to_string();
    }

    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn context() -> PageContext {
        PageContext::new("https://physics.example/qc", "QC", "Qubits and gates", 500)
    }

    #[tokio::test]
    async fn test_explain_success_sends_text_and_context() {
        let router = Router::new().route(
            EXPLAIN_PATH,
            post(|Json(body): Json<Value>| async move {
                let reply = format!(
                    "<strong>{}</strong> on {}",
                    body["text"].as_str().unwrap_or_default(),
                    body["context"]["domain"].as_str().unwrap_or_default()
                );
                Json(json!({"explanation": reply, "success": true}))
            }),
        );
        let base = serve(router).await;
        let client = ExplanationClient::new(base, Duration::from_secs(5)).unwrap();

        let explanation = client.explain("qubit", &context()).await.unwrap();
        assert_eq!(explanation, "<strong>qubit</strong> on physics.example");
    }

    #[tokio::test]
    async fn test_explain_non_2xx_is_failure() {
        let router = Router::new().route(
            EXPLAIN_PATH,
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "No text provided", "success": false})),
                )
            }),
        );
        let client = ExplanationClient::new(serve(router).await, Duration::from_secs(5)).unwrap();

        let err = client.explain("", &context()).await.unwrap_err();
        match err {
            ExplainError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "No text provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_explain_malformed_body_is_failure() {
        let router = Router::new().route(EXPLAIN_PATH, post(|| async { "not json" }));
        let client = ExplanationClient::new(serve(router).await, Duration::from_secs(5)).unwrap();

        let err = client.explain("x", &context()).await.unwrap_err();
        assert!(matches!(err, ExplainError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_explain_missing_field_is_failure() {
        let router = Router::new().route(
            EXPLAIN_PATH,
            post(|| async { Json(json!({"success": true})) }),
        );
        let client = ExplanationClient::new(serve(router).await, Duration::from_secs(5)).unwrap();

        let err = client.explain("x", &context()).await.unwrap_err();
        assert!(matches!(err, ExplainError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_explain_unreachable_is_failure() {
        // Bind then drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ExplanationClient::new(format!("http://{addr}"), Duration::from_secs(5)).unwrap();
        let err = client.explain("x", &context()).await.unwrap_err();
        assert!(matches!(err, ExplainError::Http(_)));
    }

    #[tokio::test]
    async fn test_explain_slow_service_times_out() {
        let router = Router::new().route(
            EXPLAIN_PATH,
            post(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Json(json!({"explanation": "too late"}))
            }),
        );
        let client = ExplanationClient::new(serve(router).await, Duration::from_millis(200)).unwrap();

        let started = std::time::Instant::now();
        let err = client.explain("x", &context()).await.unwrap_err();
        assert!(matches!(err, ExplainError::Http(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_endpoint_joins_path() {
        let client = ExplanationClient::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:5000/api/explain");
    }

    #[test]
    fn test_from_config_uses_endpoint() {
        let config = Config {
            endpoint: "http://sona.internal:8080/".to_string(),
            request_timeout_secs: 3,
            ..Config::default()
        };
        let client = ExplanationClient::from_config(&config).unwrap();
        assert_eq!(client.endpoint(), "http://sona.internal:8080/api/explain");
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(r#"{"error":"boom"}"#), "boom");
        assert_eq!(error_message(r#"{"error":{"message":"nested"}}"#), "nested");
        assert_eq!(error_message(r#"{"message":"top"}"#), "top");
        assert_eq!(error_message("Internal Server Error\n"), "Internal Server Error");
    }
}
