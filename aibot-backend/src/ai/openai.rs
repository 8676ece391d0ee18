use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::CompletionService;
use crate::conversation::normalize_identifier;
use crate::error::BotError;
use crate::models::{ConversationMessage, MessageRole};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Names the chat API accepts on a message.
static API_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").unwrap());

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
    model: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAICompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<OpenAIMessage>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct OpenAIMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompletionResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

impl OpenAIClient {
    pub fn new(
        api_key: &str,
        organization: Option<&str>,
        endpoint: Option<&str>,
        model: Option<&str>,
    ) -> Result<Self, BotError> {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        if !api_key.is_empty() {
            let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| BotError::Config(format!("Invalid API key format: {}", e)))?;
            auth_headers.insert(header::AUTHORIZATION, auth_value);
        }

        if let Some(org) = organization.filter(|o| !o.is_empty()) {
            let org_value = header::HeaderValue::from_str(org)
                .map_err(|e| BotError::Config(format!("Invalid organization id: {}", e)))?;
            auth_headers.insert("OpenAI-Organization", org_value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            auth_headers,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            model: model.map(str::to_string),
        })
    }

    fn build_request(&self, messages: &[ConversationMessage], system_prompt: &str) -> OpenAICompletionRequest {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        api_messages.push(OpenAIMessage {
            role: MessageRole::System.to_string(),
            content: system_prompt.to_string(),
            name: None,
        });
        api_messages.extend(messages.iter().map(|m| OpenAIMessage {
            role: m.role.to_string(),
            content: m.content.clone(),
            name: api_name(&m.speaker_name),
        }));

        OpenAICompletionRequest {
            model: self.model.clone(),
            messages: api_messages,
        }
    }
}

/// The `name` to send for a speaker, or `None` to leave it out.
///
/// Display names may hold anything; they are normalised the same way
/// handles are. A name left with no ASCII letters or digits carries no
/// identity and is dropped.
fn api_name(speaker_name: &str) -> Option<String> {
    if API_NAME.is_match(speaker_name) {
        return Some(speaker_name.to_string());
    }
    let normalized = normalize_identifier(speaker_name);
    if normalized.chars().any(|c| c.is_ascii_alphanumeric()) {
        Some(normalized)
    } else {
        None
    }
}

fn parse_completion(body: &str) -> Result<String, BotError> {
    let response: OpenAICompletionResponse = serde_json::from_str(body)
        .map_err(|e| BotError::Completion(format!("Failed to parse OpenAI response: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| BotError::Completion("OpenAI response contained no message".to_string()))
}

fn error_message(status: reqwest::StatusCode, error_text: &str) -> String {
    if let Ok(error_response) = serde_json::from_str::<OpenAIErrorResponse>(error_text) {
        return format!("OpenAI API error: {}", error_response.error.message);
    }
    let truncated: String = error_text.chars().take(200).collect();
    format!("OpenAI API returned error status: {}, body: {}", status, truncated)
}

#[async_trait]
impl CompletionService for OpenAIClient {
    async fn complete(&self, messages: &[ConversationMessage], system_prompt: &str) -> Result<String, BotError> {
        const MAX_RETRIES: u32 = 3;
        const BASE_DELAY_MS: u64 = 2000;

        let request = self.build_request(messages, system_prompt);
        log::debug!("[OPENAI] Requesting completion for {} message(s)", request.messages.len());

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                // 2s, 4s, 8s
                let delay_ms = BASE_DELAY_MS * (1 << (attempt - 1));
                log::warn!("[OPENAI] Retry attempt {}/{} after {}ms delay", attempt, MAX_RETRIES, delay_ms);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let response = match self
                .client
                .post(&self.endpoint)
                .headers(self.auth_headers.clone())
                .json(&request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) if attempt < MAX_RETRIES => {
                    log::warn!("[OPENAI] Request failed (attempt {}): {}, will retry", attempt + 1, e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            let body = response.text().await?;

            if status.is_success() {
                return parse_completion(&body);
            }

            let is_retryable = matches!(status.as_u16(), 429 | 502 | 503 | 504);
            if is_retryable && attempt < MAX_RETRIES {
                log::warn!(
                    "[OPENAI] Received retryable status {} (attempt {}), will retry",
                    status,
                    attempt + 1
                );
                continue;
            }

            return Err(BotError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        Err(BotError::Completion("OpenAI retries exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(role: MessageRole, content: &str, speaker: &str) -> ConversationMessage {
        ConversationMessage {
            role,
            content: content.to_string(),
            speaker_name: speaker.to_string(),
        }
    }

    #[test]
    fn test_api_name() {
        assert_eq!(api_name("alice_bsky_social"), Some("alice_bsky_social".to_string()));
        assert_eq!(api_name("Alice Smith"), Some("Alice_Smith".to_string()));
        assert_eq!(api_name("さわら"), None);
        assert_eq!(api_name(&"x".repeat(80)).map(|n| n.len()), Some(64));
    }

    #[test]
    fn test_request_shape() {
        let client = OpenAIClient::new("sk-test", Some("org-1"), None, Some("gpt-4")).unwrap();
        let request = client.build_request(
            &[
                message(MessageRole::User, "@aibot what should I buy?", "さわら"),
                message(MessageRole::Assistant, "Cheese.", "aibot_bsky_social"),
            ],
            "Reply friendly.",
        );

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4",
                "messages": [
                    { "role": "system", "content": "Reply friendly." },
                    { "role": "user", "content": "@aibot what should I buy?" },
                    { "role": "assistant", "content": "Cheese.", "name": "aibot_bsky_social" }
                ]
            })
        );
        assert!(client.auth_headers.contains_key("OpenAI-Organization"));
        assert_eq!(client.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_parse_completion() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Try Gruyère!" }, "finish_reason": "stop" }]
        })
        .to_string();
        assert_eq!(parse_completion(&body).unwrap(), "Try Gruyère!");

        let empty = json!({ "choices": [] }).to_string();
        assert!(matches!(parse_completion(&empty), Err(BotError::Completion(_))));
    }

    #[test]
    fn test_error_message() {
        let body = json!({ "error": { "message": "Rate limit reached", "type": "requests" } }).to_string();
        assert_eq!(
            error_message(reqwest::StatusCode::TOO_MANY_REQUESTS, &body),
            "OpenAI API error: Rate limit reached"
        );
    }
}
