use thiserror::Error;

/// Everything that can go wrong while polling, building a conversation,
/// or talking to the network and completion collaborators.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Malformed thread: {0}")]
    MalformedThread(String),

    #[error("Watermark persistence failed: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BotError {
    /// Connectivity, auth and rate-limit style failures. The supervisor
    /// recovers from these by backing off and logging in again.
    pub fn is_transient(&self) -> bool {
        match self {
            BotError::Network(_) | BotError::Completion(_) => true,
            BotError::Api { status, .. } => matches!(status, 401 | 408 | 429) || *status >= 500,
            _ => false,
        }
    }

    /// Failures scoped to a single notification; the batch keeps going.
    /// Other 4xx rejections mean the request for that item can never
    /// succeed, so retrying the cycle would only hit them again.
    pub fn is_item_local(&self) -> bool {
        match self {
            BotError::MalformedThread(_) => true,
            BotError::Api { status, .. } => (400..500).contains(status) && !self.is_transient(),
            _ => false,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        BotError::MalformedThread(message.into())
    }
}
