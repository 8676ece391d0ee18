pub mod openai;

pub use openai::OpenAIClient;

use async_trait::async_trait;

use crate::error::BotError;
use crate::models::ConversationMessage;

/// Turns a conversation into the text of a reply.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[ConversationMessage], system_prompt: &str) -> Result<String, BotError>;
}

/// One recorded `complete` call.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub input_messages: Vec<ConversationMessage>,
    pub system_prompt: String,
    pub output: Option<String>,
}

/// Mock completion client for tests: returns pre-configured responses from a
/// queue and records every call.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockCompletionClient {
    responses: std::sync::Arc<parking_lot::Mutex<std::collections::VecDeque<Result<String, BotError>>>>,
    trace: std::sync::Arc<parking_lot::Mutex<Vec<TraceEntry>>>,
}

#[cfg(test)]
impl MockCompletionClient {
    pub fn new(responses: Vec<Result<String, BotError>>) -> Self {
        Self {
            responses: std::sync::Arc::new(parking_lot::Mutex::new(responses.into())),
            trace: Default::default(),
        }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn get_trace(&self) -> Vec<TraceEntry> {
        self.trace.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl CompletionService for MockCompletionClient {
    async fn complete(&self, messages: &[ConversationMessage], system_prompt: &str) -> Result<String, BotError> {
        let result = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("(mock exhausted)".to_string()));

        self.trace.lock().push(TraceEntry {
            input_messages: messages.to_vec(),
            system_prompt: system_prompt.to_string(),
            output: result.as_ref().ok().cloned(),
        });
        result
    }
}
