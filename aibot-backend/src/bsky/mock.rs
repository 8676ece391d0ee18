//! In-memory [`SocialGraph`] for poll loop tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::SocialGraph;
use crate::error::BotError;
use crate::models::fixtures::{bot, BOT_DID};
use crate::models::{FeedItem, Notification, Post, PostRecord, PostRef, Profile, ReplyRef, ThreadNode};

/// Scripted network state plus a record of every write.
///
/// Published replies are attached to the thread they answer, so later
/// thread fetches see them the way the real service would.
#[derive(Default)]
pub struct MockSocialGraph {
    pub notifications: Mutex<Vec<Notification>>,
    pub timeline: Mutex<Vec<FeedItem>>,
    pub threads: Mutex<HashMap<String, ThreadNode>>,
    pub followers: Mutex<Vec<Profile>>,
    pub follows: Mutex<Vec<Profile>>,

    /// Errors returned, in order, by the next fetches of the source.
    pub fetch_failures: Mutex<VecDeque<BotError>>,
    pub login_failures: Mutex<VecDeque<BotError>>,
    pub publish_failures: Mutex<VecDeque<BotError>>,
    pub follow_failures: Mutex<HashMap<String, BotError>>,
    pub malformed_threads: Mutex<Vec<String>>,
    pub fail_update_seen: Mutex<bool>,

    pub logins: Mutex<usize>,
    pub published: Mutex<Vec<(String, ReplyRef)>>,
    pub followed: Mutex<Vec<String>>,
    pub seen: Mutex<Vec<DateTime<Utc>>>,
}

pub fn profile(did: &str, handle: &str) -> Profile {
    Profile {
        did: did.to_string(),
        handle: handle.to_string(),
        display_name: None,
    }
}

impl MockSocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifications(self, notifications: Vec<Notification>) -> Self {
        *self.notifications.lock() = notifications;
        self
    }

    pub fn with_timeline(self, timeline: Vec<FeedItem>) -> Self {
        *self.timeline.lock() = timeline;
        self
    }

    pub fn with_thread(self, thread: ThreadNode) -> Self {
        self.threads.lock().insert(thread.post.uri.clone(), thread);
        self
    }

    pub fn published_texts(&self) -> Vec<String> {
        self.published.lock().iter().map(|(text, _)| text.clone()).collect()
    }

    pub fn login_count(&self) -> usize {
        *self.logins.lock()
    }

    fn next_fetch_failure(&self) -> Result<(), BotError> {
        match self.fetch_failures.lock().pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SocialGraph for MockSocialGraph {
    async fn login(&self) -> Result<String, BotError> {
        *self.logins.lock() += 1;
        match self.login_failures.lock().pop_front() {
            Some(e) => Err(e),
            None => Ok(BOT_DID.to_string()),
        }
    }

    async fn get_followers(&self, _actor: &str) -> Result<Vec<Profile>, BotError> {
        Ok(self.followers.lock().clone())
    }

    async fn get_follows(&self, _actor: &str) -> Result<Vec<Profile>, BotError> {
        Ok(self.follows.lock().clone())
    }

    async fn create_follow(&self, subject_did: &str) -> Result<(), BotError> {
        if let Some(e) = self.follow_failures.lock().remove(subject_did) {
            return Err(e);
        }
        self.followed.lock().push(subject_did.to_string());
        self.follows.lock().push(profile(subject_did, subject_did));
        Ok(())
    }

    async fn get_notifications(&self) -> Result<Vec<Notification>, BotError> {
        self.next_fetch_failure()?;
        Ok(self.notifications.lock().clone())
    }

    async fn update_seen(&self, seen_at: DateTime<Utc>) -> Result<(), BotError> {
        if *self.fail_update_seen.lock() {
            return Err(BotError::Api {
                status: 500,
                message: "InternalServerError".to_string(),
            });
        }
        self.seen.lock().push(seen_at);
        Ok(())
    }

    async fn get_timeline(&self) -> Result<Vec<FeedItem>, BotError> {
        self.next_fetch_failure()?;
        Ok(self.timeline.lock().clone())
    }

    async fn get_post_thread(&self, uri: &str) -> Result<Option<ThreadNode>, BotError> {
        if self.malformed_threads.lock().iter().any(|u| u == uri) {
            return Err(BotError::malformed(format!("Invalid post record ({})", uri)));
        }
        Ok(self.threads.lock().get(uri).cloned())
    }

    async fn publish_reply(&self, text: &str, addressing: &ReplyRef) -> Result<PostRef, BotError> {
        if let Some(e) = self.publish_failures.lock().pop_front() {
            return Err(e);
        }

        let mut published = self.published.lock();
        let rkey = format!("reply{}", published.len() + 1);
        published.push((text.to_string(), addressing.clone()));

        let now = Utc::now();
        let reply = Post {
            uri: format!("at://{}/app.bsky.feed.post/{}", BOT_DID, rkey),
            cid: format!("cid-{}", rkey),
            author: bot(),
            record: PostRecord {
                text: text.to_string(),
                created_at: now,
                reply: Some(addressing.clone()),
                mentions: Vec::new(),
            },
            indexed_at: now,
        };
        let reply_ref = reply.as_ref();
        if let Some(parent) = self.threads.lock().get_mut(&addressing.parent.uri) {
            parent.replies.push(ThreadNode::new(reply));
        }
        Ok(reply_ref)
    }
}
