//! Bluesky (AT Protocol) access.

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod wire;

pub use client::BskyClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BotError;
use crate::models::{FeedItem, Notification, PostRef, Profile, ReplyRef, ThreadNode};

/// The network operations the poll loop depends on.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Open a session and return the account's DID.
    async fn login(&self) -> Result<String, BotError>;

    async fn get_followers(&self, actor: &str) -> Result<Vec<Profile>, BotError>;

    async fn get_follows(&self, actor: &str) -> Result<Vec<Profile>, BotError>;

    async fn create_follow(&self, subject_did: &str) -> Result<(), BotError>;

    async fn get_notifications(&self) -> Result<Vec<Notification>, BotError>;

    /// Mark notifications up to `seen_at` as read.
    async fn update_seen(&self, seen_at: DateTime<Utc>) -> Result<(), BotError>;

    async fn get_timeline(&self) -> Result<Vec<FeedItem>, BotError>;

    /// The post at `uri` with its ancestors and direct replies, or `None`
    /// when the post is gone or not visible.
    async fn get_post_thread(&self, uri: &str) -> Result<Option<ThreadNode>, BotError>;

    async fn publish_reply(&self, text: &str, addressing: &ReplyRef) -> Result<PostRef, BotError>;
}
