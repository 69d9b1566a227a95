//! Explanation requests: page context, the client seam and its HTTP client.

mod client;

pub use client::{EXPLAIN_PATH, ExplanationClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata about the page a selection was made on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageContext {
    pub url: String,
    pub title: String,
    /// Host name of `url`, empty when it has none.
    pub domain: String,
    /// Leading slice of the page's visible text.
    pub page_text: String,
}

impl PageContext {
    /// Build a context from raw page facts, keeping at most `text_limit`
    /// characters of body text.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        body_text: &str,
        text_limit: usize,
    ) -> Self {
        let url = url.into();
        let domain = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        Self {
            url,
            title: title.into(),
            domain,
            page_text: body_text.chars().take(text_limit).collect(),
        }
    }
}

/// Body of `POST /api/explain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub context: PageContext,
}

#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("Explanation service unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Explanation service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed explanation response: {0}")]
    Malformed(String),

    #[error("Explanation service is not running")]
    ChannelClosed,
}

/// Anything that can turn a text fragment into an explanation.
///
/// The returned string is formatted markup. Every failure is reported as an
/// `Err`, never a panic.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, text: &str, context: &PageContext) -> Result<String, ExplainError>;
}
