use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::BotError;
use crate::poller::{PollConfig, ReplySource};
use crate::triage::REPLYABLE_REASONS;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const HANDLE: &str = "BSKY_HANDLE";
    pub const PASSWORD: &str = "BSKY_PASSWORD";
    // Legacy names, still read when the BSKY_ ones are unset
    pub const LEGACY_HANDLE: &str = "HANDLE";
    pub const LEGACY_PASSWORD: &str = "PASSWORD";
    pub const SERVICE_URL: &str = "BSKY_SERVICE_URL";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const OPENAI_ORGANIZATION: &str = "OPENAI_ORGANIZATION";
    pub const OPENAI_ENDPOINT: &str = "OPENAI_ENDPOINT";
    pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
    pub const SYSTEM_PROMPT: &str = "AIBOT_SYSTEM_PROMPT";
    pub const WATERMARK_FILE: &str = "AIBOT_WATERMARK_FILE";
    pub const POLL_INTERVAL_SECS: &str = "AIBOT_POLL_INTERVAL_SECS";
    pub const RETRY_BACKOFF_SECS: &str = "AIBOT_RETRY_BACKOFF_SECS";
    pub const SOURCE: &str = "AIBOT_SOURCE";
    pub const FOLLOW_BACK: &str = "AIBOT_FOLLOW_BACK";
}

/// Default values
pub mod defaults {
    pub const SERVICE_URL: &str = "https://bsky.social";
    pub const OPENAI_ENDPOINT: &str = crate::ai::openai::DEFAULT_ENDPOINT;
    pub const OPENAI_MODEL: &str = "gpt-4";
    pub const SYSTEM_PROMPT: &str = "Reply friendly in 280 characters or less. No @mentions.";
    pub const WATERMARK_FILE: &str = "./last_seen_at.txt";
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Five minutes
    pub const RETRY_BACKOFF_SECS: u64 = 300;
    pub const FOLLOW_BACK: bool = true;
}

#[derive(Clone)]
pub struct Config {
    pub handle: String,
    pub password: String,
    pub service_url: String,
    pub openai_api_key: String,
    pub openai_organization: Option<String>,
    pub openai_endpoint: String,
    pub openai_model: String,
    pub system_prompt: String,
    pub watermark_file: PathBuf,
    pub poll_interval_secs: u64,
    pub retry_backoff_secs: u64,
    pub source: ReplySource,
    pub follow_back: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("handle", &self.handle)
            .field("password", &"<redacted>")
            .field("service_url", &self.service_url)
            .field("openai_api_key", &"<redacted>")
            .field("openai_organization", &self.openai_organization)
            .field("openai_endpoint", &self.openai_endpoint)
            .field("openai_model", &self.openai_model)
            .field("watermark_file", &self.watermark_file)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("retry_backoff_secs", &self.retry_backoff_secs)
            .field("source", &self.source)
            .field("follow_back", &self.follow_back)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, BotError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BotError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str, legacy: Option<&str>| {
            get(key)
                .or_else(|| legacy.and_then(|l| get(l)))
                .ok_or_else(|| BotError::Config(format!("{} not configured", key)))
        };
        let seconds = |key: &str, default: u64| match get(key) {
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| BotError::Config(format!("{} must be a whole number of seconds, got {:?}", key, v))),
            None => Ok(default),
        };

        let source = match get(env_vars::SOURCE) {
            Some(v) => ReplySource::from_str(&v).ok_or_else(|| {
                BotError::Config(format!("{} must be 'notifications' or 'timeline', got {:?}", env_vars::SOURCE, v))
            })?,
            None => ReplySource::Notifications,
        };

        Ok(Self {
            handle: required(env_vars::HANDLE, Some(env_vars::LEGACY_HANDLE))?,
            password: required(env_vars::PASSWORD, Some(env_vars::LEGACY_PASSWORD))?,
            service_url: get(env_vars::SERVICE_URL).unwrap_or_else(|| defaults::SERVICE_URL.to_string()),
            openai_api_key: required(env_vars::OPENAI_API_KEY, None)?,
            openai_organization: get(env_vars::OPENAI_ORGANIZATION),
            openai_endpoint: get(env_vars::OPENAI_ENDPOINT).unwrap_or_else(|| defaults::OPENAI_ENDPOINT.to_string()),
            openai_model: get(env_vars::OPENAI_MODEL).unwrap_or_else(|| defaults::OPENAI_MODEL.to_string()),
            system_prompt: get(env_vars::SYSTEM_PROMPT).unwrap_or_else(|| defaults::SYSTEM_PROMPT.to_string()),
            watermark_file: PathBuf::from(
                get(env_vars::WATERMARK_FILE).unwrap_or_else(|| defaults::WATERMARK_FILE.to_string()),
            ),
            poll_interval_secs: seconds(env_vars::POLL_INTERVAL_SECS, defaults::POLL_INTERVAL_SECS)?,
            retry_backoff_secs: seconds(env_vars::RETRY_BACKOFF_SECS, defaults::RETRY_BACKOFF_SECS)?,
            source,
            follow_back: get(env_vars::FOLLOW_BACK)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults::FOLLOW_BACK),
        })
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            source: self.source,
            reasons: REPLYABLE_REASONS.to_vec(),
            follow_back: self.follow_back,
            system_prompt: self.system_prompt.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    const MINIMAL: [(&str, &str); 3] = [
        ("BSKY_HANDLE", "aibot.bsky.social"),
        ("BSKY_PASSWORD", "app-password"),
        ("OPENAI_API_KEY", "sk-test"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&MINIMAL)).unwrap();
        assert_eq!(config.service_url, "https://bsky.social");
        assert_eq!(config.openai_model, "gpt-4");
        assert_eq!(config.watermark_file, PathBuf::from("./last_seen_at.txt"));
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.retry_backoff_secs, 300);
        assert_eq!(config.source, ReplySource::Notifications);
        assert!(config.follow_back);
        assert!(config.openai_organization.is_none());

        let poll = config.poll_config();
        assert_eq!(poll.retry_backoff, Duration::from_secs(300));
        assert_eq!(poll.reasons, REPLYABLE_REASONS.to_vec());
    }

    #[test]
    fn test_legacy_credentials() {
        let config = Config::from_lookup(lookup(&[
            ("HANDLE", "aibot.bsky.social"),
            ("PASSWORD", "app-password"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(config.handle, "aibot.bsky.social");
        assert_eq!(config.password, "app-password");
    }

    #[test]
    fn test_missing_and_invalid_values() {
        let err = Config::from_lookup(lookup(&[("BSKY_HANDLE", "aibot.bsky.social")])).unwrap_err();
        assert!(matches!(err, BotError::Config(ref m) if m.contains("BSKY_PASSWORD")));

        let mut pairs = MINIMAL.to_vec();
        pairs.push(("AIBOT_POLL_INTERVAL_SECS", "soon"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = MINIMAL.to_vec();
        pairs.push(("AIBOT_SOURCE", "firehose"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = MINIMAL.to_vec();
        pairs.extend([
            ("AIBOT_SOURCE", "Timeline"),
            ("AIBOT_FOLLOW_BACK", "false"),
            ("OPENAI_ORGANIZATION", "org-123"),
            ("AIBOT_POLL_INTERVAL_SECS", "30"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.source, ReplySource::Timeline);
        assert!(!config.follow_back);
        assert_eq!(config.openai_organization.as_deref(), Some("org-123"));
        assert_eq!(config.poll_interval_secs, 30);

        let debug = format!("{:?}", config);
        assert!(!debug.contains("app-password"));
        assert!(!debug.contains("sk-test"));
    }
}
