//! Deciding which notifications still need an answer.

use chrono::{DateTime, Duration, Utc};

use crate::models::{FeedItem, Notification, NotificationReason, ThreadNode};
use crate::reply_policy;

/// Notifications become visible some time after they are indexed, so the
/// freshness cut-off sits this far before the watermark.
pub const FRESHNESS_SKEW_SECS: i64 = 120;

/// Reasons the bot answers.
pub const REPLYABLE_REASONS: [NotificationReason; 2] = [NotificationReason::Mention, NotificationReason::Reply];

pub fn freshness_skew() -> Duration {
    Duration::seconds(FRESHNESS_SKEW_SECS)
}

/// Keep notifications whose reason is replyable and listed in `reasons`.
pub fn filter_by_reason(notifications: Vec<Notification>, reasons: &[NotificationReason]) -> Vec<Notification> {
    notifications
        .into_iter()
        .filter(|n| n.reason.is_replyable() && reasons.contains(&n.reason))
        .collect()
}

/// True when `indexed_at` lies strictly after `watermark - skew`.
/// With no watermark everything is fresh.
pub fn is_fresh(indexed_at: DateTime<Utc>, watermark: Option<DateTime<Utc>>) -> bool {
    match watermark {
        Some(mark) => indexed_at > mark - freshness_skew(),
        None => true,
    }
}

pub fn filter_fresh(notifications: Vec<Notification>, watermark: Option<DateTime<Utc>>) -> Vec<Notification> {
    notifications
        .into_iter()
        .filter(|n| is_fresh(n.indexed_at, watermark))
        .collect()
}

/// Reason and freshness filtering, then oldest-first ordering.
///
/// The already-answered filter needs the thread and runs per item in the
/// poll loop, right before each reply, so it observes replies published
/// earlier in the same batch.
pub fn triage(
    notifications: Vec<Notification>,
    reasons: &[NotificationReason],
    watermark: Option<DateTime<Utc>>,
) -> Vec<Notification> {
    let mut kept = filter_fresh(filter_by_reason(notifications, reasons), watermark);
    kept.sort_by_key(|n| n.indexed_at);
    kept
}

/// True when some direct reply under `thread`'s post is by the bot.
/// Deeper descendants are deliberately not inspected.
pub fn is_already_answered(thread: &ThreadNode, bot_did: &str) -> bool {
    thread.replies.iter().any(|reply| reply.post.is_authored_by(bot_did))
}

/// Timeline counterpart of [`triage`]: posts by others that mention the bot
/// or reply to one of its posts, fresh, oldest first.
///
/// Without a watermark nothing on the timeline is treated as new.
pub fn triage_timeline(feed: Vec<FeedItem>, bot_did: &str, watermark: Option<DateTime<Utc>>) -> Vec<FeedItem> {
    if watermark.is_none() {
        return Vec::new();
    }

    let mut kept: Vec<FeedItem> = feed
        .into_iter()
        .filter(|item| !item.post.is_authored_by(bot_did))
        .filter(|item| {
            reply_policy::has_mention_of(&item.post, bot_did) || reply_policy::is_reply_to(item, bot_did)
        })
        .filter(|item| is_fresh(item.post.indexed_at, watermark))
        .collect();
    kept.sort_by_key(|item| item.post.indexed_at);
    kept
}
