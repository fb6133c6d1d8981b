//! AI summarizer collaborator contract.
//!
//! The assistant itself is external; this module only specifies the call
//! surface (`SummarizeMessage`, `Chat`) and provides the HTTP
//! implementation plus the deterministic truncation fallback used when the
//! assistant is slow or unavailable.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use argus_core::{NotificationType, Priority};

use crate::error::{EnrichError, Result};

/// Default deadline for assistant calls.
const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(15);

/// The AI collaborator surface.
pub trait Summarizer: Send + Sync {
    /// Produce a short spoken-style summary within `max_words`.
    fn summarize(
        &self,
        kind: NotificationType,
        priority: Priority,
        title: &str,
        message: &str,
        max_words: usize,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Free-form chat with history and context. Unused by enrichment;
    /// part of the collaborator contract.
    fn chat(
        &self,
        history: &[(String, String)],
        context: &str,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// HTTP summarizer configuration.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Base URL of the assistant service.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8700".to_string(),
            timeout: DEFAULT_AI_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    #[serde(rename = "type")]
    kind: NotificationType,
    priority: Priority,
    title: &'a str,
    message: &'a str,
    max_words: usize,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    summary: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    history: &'a [(String, String)],
    context: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    reply: String,
}

/// HTTP implementation of the assistant contract.
pub struct HttpSummarizer {
    client: Client,
    config: SummarizerConfig,
}

impl HttpSummarizer {
    pub fn new(config: SummarizerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EnrichError::SummarizerFailed(format!("client build: {e}")))?;
        Ok(Self { client, config })
    }
}

impl Summarizer for HttpSummarizer {
    async fn summarize(
        &self,
        kind: NotificationType,
        priority: Priority,
        title: &str,
        message: &str,
        max_words: usize,
    ) -> Result<String> {
        let url = format!("{}/summarize", self.config.base_url);
        let request = SummarizeRequest {
            kind,
            priority,
            title,
            message,
            max_words,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EnrichError::SummarizerFailed(format!("request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::SummarizerFailed(format!("HTTP {status}")));
        }

        let body: SummarizeResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::SummarizerFailed(format!("parse: {e}")))?;

        if body.summary.trim().is_empty() {
            return Err(EnrichError::SummarizerFailed("empty summary".to_string()));
        }
        Ok(body.summary)
    }

    async fn chat(
        &self,
        history: &[(String, String)],
        context: &str,
        prompt: &str,
    ) -> Result<String> {
        let url = format!("{}/chat", self.config.base_url);
        let request = ChatRequest {
            history,
            context,
            prompt,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EnrichError::SummarizerFailed(format!("request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::SummarizerFailed(format!("HTTP {status}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::SummarizerFailed(format!("parse: {e}")))?;
        Ok(body.reply)
    }
}

/// Deterministic fallback: the first `max_words` words of the title (or
/// the message when the title is empty).
#[must_use]
pub fn fallback_summary(title: &str, message: &str, max_words: usize) -> String {
    let source = if title.trim().is_empty() { message } else { title };
    truncate_words(source, max_words)
}

/// Keep the first `max_words` whitespace-separated words.
#[must_use]
pub fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("one two three four", 2), "one two");
        assert_eq!(truncate_words("one", 5), "one");
        assert_eq!(truncate_words("  spaced   out  ", 3), "spaced out");
    }

    #[test]
    fn test_fallback_prefers_title() {
        assert_eq!(fallback_summary("Title here", "Message body", 10), "Title here");
        assert_eq!(fallback_summary("  ", "Message body", 1), "Message");
    }
}
