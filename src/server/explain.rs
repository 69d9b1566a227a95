//! Rule-based explanations served by `POST /api/explain`.

use crate::explain::PageContext;
use askama::Template;
use regex::Regex;
use std::sync::LazyLock;

static FORMULA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-z]\s*[=+\-*/]\s*[a-z0-9]").expect("formula regex must be valid")
});

const ACADEMIC_TERMS: [(&str, &str); 4] = [
    (
        "machine learning",
        "Machine Learning is a subset of artificial intelligence that enables computers to learn and make decisions from data without being explicitly programmed for every task.",
    ),
    (
        "neural network",
        "A neural network is a computing system inspired by biological neural networks. It consists of interconnected nodes (neurons) that process information and can learn patterns from data.",
    ),
    (
        "quantum computing",
        "Quantum computing uses quantum mechanical phenomena like superposition and entanglement to perform calculations that would be impossible or extremely slow for classical computers.",
    ),
    (
        "blockchain",
        "Blockchain is a distributed ledger technology that maintains a continuously growing list of records (blocks) that are linked and secured using cryptography.",
    ),
];

#[derive(Template)]
#[template(
    source = "<strong>{{ text }}</strong> appears to be a mathematical formula or equation. In mathematics, equations like this express relationships between variables and constants. The '=' sign indicates equality, meaning both sides have the same value.",
    ext = "html"
)]
struct FormulaExplanation<'a> {
    text: &'a str,
}

#[derive(Template)]
#[template(
    source = "<strong>{{ text }}</strong> is a concept mentioned on {{ source }}. This appears to be an important term in your current research. For a more detailed explanation, consider searching academic databases or educational videos about this topic.",
    ext = "html"
)]
struct DefaultExplanation<'a> {
    text: &'a str,
    source: &'a str,
}

/// Explain `text` as HTML. User-supplied text and the page domain are
/// escaped by the templates.
pub fn generate_explanation(text: &str, context: &PageContext) -> askama::Result<String> {
    let lower = text.to_lowercase();

    if text.contains('=') || FORMULA.is_match(&lower) {
        return FormulaExplanation { text }.render();
    }

    if let Some((_, explanation)) = ACADEMIC_TERMS.iter().find(|(term, _)| lower.contains(term)) {
        return Ok((*explanation).to_string());
    }

    let source = if context.domain.is_empty() {
        "this webpage"
    } else {
        context.domain.as_str()
    };
    DefaultExplanation { text, source }.render()
}
