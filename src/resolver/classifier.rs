// src/resolver/classifier.rs

//! Classification backend seam.
//!
//! The LLM fallback tier is an injected strategy so the deterministic
//! matching tiers stay testable without any network dependency. Any
//! backend failure degrades to "no candidates" at the resolver boundary;
//! nothing here is allowed to abort a batch.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::models::ClassifierConfig;

/// Sentinel line a backend returns when it found nothing.
pub const NO_FEATURES_SENTINEL: &str = "NO_FEATURES";

/// A classification backend: free text in, feature names out.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the text into zero or more feature names.
    ///
    /// Transport or parse failures surface as errors here; the resolver
    /// treats any error as an empty result.
    async fn classify(&self, text: &str) -> Result<Vec<String>>;
}

/// HTTP-backed classifier speaking a chat-completions style protocol.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

impl HttpClassifier {
    /// Build a classifier from config. Returns None when no endpoint is
    /// configured; the fallback tier is simply disabled then.
    pub fn from_config(config: &ClassifierConfig) -> Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.clone() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            client,
            endpoint,
            model: config.model.clone(),
        }))
    }

    fn prompt(text: &str) -> String {
        format!(
            "List the product features this post refers to, one name per line. \
             Reply with exactly {NO_FEATURES_SENTINEL} if it refers to none.\n\n{text}"
        )
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<String>> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": Self::prompt(text) }],
        });

        let response: CompletionResponse = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        Ok(parse_lines(content))
    }
}

/// Parse a newline-delimited backend reply into feature names.
pub fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.eq_ignore_ascii_case(NO_FEATURES_SENTINEL))
        .map(|line| line.trim_start_matches(['-', '*', ' ']).to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Fixed-response classifier for tests and dry runs.
pub struct StubClassifier {
    lines: Vec<String>,
}

impl StubClassifier {
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, _text: &str) -> Result<Vec<String>> {
        Ok(self.lines.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_basic() {
        assert_eq!(
            parse_lines("Gradebook\nQuizzes\n"),
            vec!["Gradebook", "Quizzes"]
        );
    }

    #[test]
    fn test_parse_lines_sentinel() {
        assert!(parse_lines("NO_FEATURES").is_empty());
        assert!(parse_lines("no_features").is_empty());
        assert!(parse_lines("").is_empty());
    }

    #[test]
    fn test_parse_lines_strips_bullets() {
        assert_eq!(
            parse_lines("- Gradebook\n* Quizzes"),
            vec!["Gradebook", "Quizzes"]
        );
    }

    #[tokio::test]
    async fn test_stub_classifier() {
        let stub = StubClassifier::new(["Gradebook"]);
        assert_eq!(stub.classify("whatever").await.unwrap(), vec!["Gradebook"]);
    }
}
