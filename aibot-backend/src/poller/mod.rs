//! The polling engine: one sequential cycle at a time under a supervisor
//! that backs off and logs in again after transient failures.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::ai::CompletionService;
use crate::bsky::SocialGraph;
use crate::conversation::thread_to_messages;
use crate::error::BotError;
use crate::follow_back::follow_back;
use crate::models::{NotificationReason, Post};
use crate::reply_policy::{addressing_for, prepare_reply_text};
use crate::triage::{is_already_answered, triage, triage_timeline, REPLYABLE_REASONS};
use crate::watermark::Watermark;

/// Where candidate posts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Notifications,
    Timeline,
}

impl ReplySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplySource::Notifications => "notifications",
            ReplySource::Timeline => "timeline",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notifications" | "notification" => Some(ReplySource::Notifications),
            "timeline" => Some(ReplySource::Timeline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub source: ReplySource,
    pub reasons: Vec<NotificationReason>,
    pub follow_back: bool,
    pub system_prompt: String,
    pub poll_interval: Duration,
    pub retry_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            source: ReplySource::Notifications,
            reasons: REPLYABLE_REASONS.to_vec(),
            follow_back: true,
            system_prompt: crate::config::defaults::SYSTEM_PROMPT.to_string(),
            poll_interval: Duration::from_secs(crate::config::defaults::POLL_INTERVAL_SECS),
            retry_backoff: Duration::from_secs(crate::config::defaults::RETRY_BACKOFF_SECS),
        }
    }
}

/// Result of one poll cycle; drives what the supervisor does next.
#[derive(Debug)]
pub enum CycleOutcome {
    Success { replied: usize, skipped: usize },
    TransientFailure(BotError),
    FatalFailure(BotError),
}

impl CycleOutcome {
    fn from_error(e: BotError) -> Self {
        match e {
            BotError::Config(_) => CycleOutcome::FatalFailure(e),
            e => {
                if !e.is_transient() {
                    log::warn!("Poller: Treating unexpected error as transient: {}", e);
                }
                CycleOutcome::TransientFailure(e)
            }
        }
    }
}

/// What happened to a single candidate post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Replied,
    OwnPost,
    ThreadNotFound,
    AlreadyAnswered,
    EmptyCompletion,
}

pub struct PollLoop {
    social: Arc<dyn SocialGraph>,
    completion: Arc<dyn CompletionService>,
    watermark: Watermark,
    config: PollConfig,
    bot_did: Option<String>,
}

impl PollLoop {
    pub fn new(
        social: Arc<dyn SocialGraph>,
        completion: Arc<dyn CompletionService>,
        watermark: Watermark,
        config: PollConfig,
    ) -> Self {
        Self {
            social,
            completion,
            watermark,
            config,
            bot_did: None,
        }
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark.current()
    }

    /// Open a session and remember the bot's DID.
    pub async fn authenticate(&mut self) -> Result<(), BotError> {
        let did = self.social.login().await?;
        self.bot_did = Some(did);
        Ok(())
    }

    /// Run one cycle: fetch, triage, answer each item in order, then
    /// advance the watermark to the time the cycle started.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let Some(bot_did) = self.bot_did.clone() else {
            return CycleOutcome::FatalFailure(BotError::Config("poll cycle started before login".to_string()));
        };
        let cycle_start = Utc::now();

        if self.config.follow_back {
            match follow_back(self.social.as_ref(), &bot_did).await {
                Ok(0) => {}
                Ok(n) => log::info!("Poller: Followed back {} account(s)", n),
                Err(e) => log::warn!("Poller: Follow-back failed: {}", e),
            }
        }

        let candidates = match self.collect_candidates(&bot_did).await {
            Ok(candidates) => candidates,
            Err(e) => return CycleOutcome::from_error(e),
        };
        if !candidates.is_empty() {
            log::info!("Poller: {} candidate(s) from {}", candidates.len(), self.config.source.as_str());
        }

        let (mut replied, mut skipped) = (0, 0);
        for post in &candidates {
            match self.process_post(post, &bot_did).await {
                Ok(ItemOutcome::Replied) => replied += 1,
                Ok(_) => skipped += 1,
                Err(e) if e.is_item_local() => {
                    log::warn!("Poller: Skipping {}: {}", post.uri, e);
                    skipped += 1;
                }
                Err(e) => return CycleOutcome::from_error(e),
            }
        }

        if let Err(e) = self.social.update_seen(cycle_start).await {
            log::warn!("Poller: Failed to mark notifications seen: {}", e);
        }

        if let Err(e) = self.watermark.advance(cycle_start) {
            log::error!(
                "Poller: {} - watermark only advanced in memory, a restart may re-reply",
                e
            );
        }

        CycleOutcome::Success { replied, skipped }
    }

    async fn collect_candidates(&self, bot_did: &str) -> Result<Vec<Post>, BotError> {
        let watermark = self.watermark();
        match self.config.source {
            ReplySource::Notifications => {
                let notifications = self.social.get_notifications().await?;
                Ok(triage(notifications, &self.config.reasons, watermark)
                    .into_iter()
                    .filter_map(|n| {
                        let post = n.to_post();
                        if post.is_none() {
                            log::warn!("Poller: {} notification {} has no post record", n.reason, n.uri);
                        }
                        post
                    })
                    .collect())
            }
            ReplySource::Timeline => {
                let feed = self.social.get_timeline().await?;
                Ok(triage_timeline(feed, bot_did, watermark)
                    .into_iter()
                    .map(|item| item.post)
                    .collect())
            }
        }
    }

    async fn process_post(&self, post: &Post, bot_did: &str) -> Result<ItemOutcome, BotError> {
        if post.is_authored_by(bot_did) {
            log::debug!("Poller: Ignoring own post {}", post.uri);
            return Ok(ItemOutcome::OwnPost);
        }

        let Some(thread) = self.social.get_post_thread(&post.uri).await? else {
            log::info!("Poller: Thread for {} is gone, skipping", post.uri);
            return Ok(ItemOutcome::ThreadNotFound);
        };

        if is_already_answered(&thread, bot_did) {
            log::info!("Poller: Already replied to {}", post.uri);
            return Ok(ItemOutcome::AlreadyAnswered);
        }

        let messages = thread_to_messages(Some(&thread), bot_did)?;
        log::debug!(
            "Poller: {} message(s) of context for {} ({} ancestor(s))",
            messages.len(),
            post.uri,
            thread.depth()
        );

        let completion = self.completion.complete(&messages, &self.config.system_prompt).await?;
        let Some(text) = prepare_reply_text(&completion) else {
            log::warn!("Poller: Empty completion for {}, not replying", post.uri);
            return Ok(ItemOutcome::EmptyCompletion);
        };

        let reply = self.social.publish_reply(&text, &addressing_for(post)).await?;
        log::info!("Poller: Replied to @{} ({}) with {}", post.author.handle, post.uri, reply.uri);
        Ok(ItemOutcome::Replied)
    }

    /// Supervise cycles until `shutdown_rx` fires or a fatal error occurs.
    pub async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) -> Result<(), BotError> {
        log::info!(
            "Poller: Starting (source={}, poll_interval={}s, retry_backoff={}s, follow_back={})",
            self.config.source.as_str(),
            self.config.poll_interval.as_secs(),
            self.config.retry_backoff.as_secs(),
            self.config.follow_back
        );

        let mut needs_login = true;
        loop {
            let pause = if needs_login {
                match self.authenticate().await {
                    Ok(()) => {
                        needs_login = false;
                        None
                    }
                    Err(e @ BotError::Config(_)) => return Err(e),
                    Err(e) => {
                        log::error!("Poller: Login failed: {}", e);
                        Some(self.config.retry_backoff)
                    }
                }
            } else {
                None
            };

            let pause = match pause {
                Some(pause) => pause,
                None => match self.run_cycle().await {
                    CycleOutcome::Success { replied, skipped } => {
                        if replied > 0 || skipped > 0 {
                            log::info!("Poller: Cycle done ({} replied, {} skipped)", replied, skipped);
                        }
                        self.config.poll_interval
                    }
                    CycleOutcome::TransientFailure(e) => {
                        log::error!(
                            "Poller: Cycle failed: {} - retrying in {}s",
                            e,
                            self.config.retry_backoff.as_secs()
                        );
                        needs_login = true;
                        self.config.retry_backoff
                    }
                    CycleOutcome::FatalFailure(e) => {
                        log::error!("Poller: Fatal error, stopping: {}", e);
                        return Err(e);
                    }
                },
            };

            tokio::select! {
                _ = &mut shutdown_rx => {
                    log::info!("Poller: Received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        Ok(())
    }
}
