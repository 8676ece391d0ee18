//! Builders shared by unit tests across the crate.

use chrono::{DateTime, TimeZone, Utc};

use super::{Author, MentionFacet, Notification, NotificationReason, Post, PostRecord, ReplyRef};

pub const BOT_DID: &str = "did:plc:aibot";
pub const BOT_HANDLE: &str = "aibot.bsky.social";

/// 2023-07-02T06:00:00Z plus `secs`.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 7, 2, 6, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

pub fn author(did: &str, handle: &str) -> Author {
    Author {
        did: did.to_string(),
        handle: handle.to_string(),
        display_name: None,
    }
}

pub fn bot() -> Author {
    author(BOT_DID, BOT_HANDLE)
}

pub fn alice() -> Author {
    author("did:plc:alice", "alice.bsky.social")
}

pub fn post(rkey: &str, author: Author, text: &str, indexed_secs: i64) -> Post {
    Post {
        uri: format!("at://{}/app.bsky.feed.post/{}", author.did, rkey),
        cid: format!("cid-{}", rkey),
        author,
        record: PostRecord {
            text: text.to_string(),
            created_at: ts(indexed_secs),
            reply: None,
            mentions: Vec::new(),
        },
        indexed_at: ts(indexed_secs),
    }
}

/// `child` replying to `parent` inside the thread rooted at `root`.
pub fn reply_to(mut child: Post, root: &Post, parent: &Post) -> Post {
    child.record.reply = Some(ReplyRef {
        root: root.as_ref(),
        parent: parent.as_ref(),
    });
    child
}

pub fn mentioning(mut post: Post, did: &str) -> Post {
    post.record.mentions.push(MentionFacet {
        did: did.to_string(),
        byte_start: 0,
        byte_end: 18,
    });
    post
}

pub fn notification(post: &Post, reason: NotificationReason) -> Notification {
    Notification {
        uri: post.uri.clone(),
        cid: post.cid.clone(),
        reason,
        author: post.author.clone(),
        record: Some(post.record.clone()),
        indexed_at: post.indexed_at,
        is_read: false,
    }
}

pub fn like_notification(liker: Author, indexed_secs: i64) -> Notification {
    Notification {
        uri: format!("at://{}/app.bsky.feed.like/{}", liker.did, indexed_secs),
        cid: format!("cid-like-{}", indexed_secs),
        reason: NotificationReason::Like,
        author: liker,
        record: None,
        indexed_at: ts(indexed_secs),
        is_read: false,
    }
}
