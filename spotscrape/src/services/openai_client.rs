//! OpenAI-compatible content analyzer
//!
//! Sends page text to a chat completions endpoint and parses the
//! `Artist - Album` lines it returns.

use crate::services::ai_extractor::parse_mentions;
use crate::types::{AlbumMention, ContentAnalyzer};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use spotscrape_common::config::OpenAiConfig;
use spotscrape_common::Error;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a precise music information extractor. Your task is to identify and extract ONLY artist and album pairs from the provided text.

Rules:
1. Extract ONLY complete artist-album pairs
2. Maintain exact original spelling and capitalization
3. Include full albums only (no singles or EPs unless explicitly labeled as albums)
4. Ignore any non-music content, advertisements, or navigation elements
5. Do not include track listings or song names
6. Do not include commentary, reviews, or ratings
7. If an artist has multiple albums mentioned, list each pair separately
8. Do not add any additional formatting or punctuation to artist or album names

Format each pair exactly as: Artist - Album
One pair per line
No additional text, commentary, or punctuation";

/// Errors from the chat completions API
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,

    #[error("API key not configured")]
    MissingApiKey,
}

impl From<LlmError> for Error {
    fn from(err: LlmError) -> Self {
        const SERVICE: &str = "openai";
        match err {
            LlmError::Connection(msg) => Error::external(SERVICE, msg),
            LlmError::Api { status, message } => Error::external_status(SERVICE, status, message),
            LlmError::InvalidResponse(msg) => Error::external(SERVICE, msg),
            LlmError::RateLimited => Error::external_status(SERVICE, 429, "rate limited"),
            LlmError::Timeout => Error::external(SERVICE, "request timeout"),
            LlmError::MissingApiKey => Error::Config("OpenAI API key not configured".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Content analyzer backed by an OpenAI-compatible API
pub struct OpenAiAnalyzer {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiAnalyzer {
    pub fn new(config: &OpenAiConfig, api_key: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout,
        }
    }

    /// Raw completion text for one chunk
    pub async fn complete(&self, text: &str) -> Result<String, LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Extract artist-album pairs from this text:\n\n{}", text),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, chars = text.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        Ok(content.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
    }
}

#[async_trait::async_trait]
impl ContentAnalyzer for OpenAiAnalyzer {
    async fn analyze_content(&self, text: &str) -> spotscrape_common::Result<Vec<AlbumMention>> {
        let content = self.complete(text).await.map_err(|e| match e {
            LlmError::Timeout => Error::Timeout(self.timeout.as_millis() as u64),
            other => other.into(),
        })?;
        let mentions = parse_mentions(&content);
        debug!(mentions = mentions.len(), "Completion parsed");
        Ok(mentions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_retryability() {
        let err: Error = LlmError::RateLimited.into();
        assert!(err.is_transient());
        let err: Error = LlmError::Api {
            status: 401,
            message: "bad key".into(),
        }
        .into();
        assert!(!err.is_transient());
        let err: Error = LlmError::Timeout.into();
        assert!(err.is_transient());
        let err: Error = LlmError::MissingApiKey.into();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let analyzer = OpenAiAnalyzer::new(&OpenAiConfig::default(), String::new(), Duration::from_secs(1));
        assert!(matches!(analyzer.complete("text").await, Err(LlmError::MissingApiKey)));
    }
}
