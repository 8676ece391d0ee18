use chrono::{DateTime, Utc};

use super::post::{Author, Post, PostRecord};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationReason {
    Mention,
    Reply,
    Like,
    Repost,
    Follow,
    Quote,
    Other(String),
}

impl NotificationReason {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationReason::Mention => "mention",
            NotificationReason::Reply => "reply",
            NotificationReason::Like => "like",
            NotificationReason::Repost => "repost",
            NotificationReason::Follow => "follow",
            NotificationReason::Quote => "quote",
            NotificationReason::Other(s) => s.as_str(),
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "mention" => NotificationReason::Mention,
            "reply" => NotificationReason::Reply,
            "like" => NotificationReason::Like,
            "repost" => NotificationReason::Repost,
            "follow" => NotificationReason::Follow,
            "quote" => NotificationReason::Quote,
            other => NotificationReason::Other(other.to_string()),
        }
    }

    /// Only mentions and replies are answered.
    pub fn is_replyable(&self) -> bool {
        matches!(self, NotificationReason::Mention | NotificationReason::Reply)
    }
}

impl std::fmt::Display for NotificationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event surfaced for the bot's account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub uri: String,
    pub cid: String,
    pub reason: NotificationReason,
    pub author: Author,
    /// Present when the subject record is a post (mentions, replies, quotes).
    pub record: Option<PostRecord>,
    pub indexed_at: DateTime<Utc>,
    pub is_read: bool,
}

impl Notification {
    /// The notifying post, when the notification carries one.
    pub fn to_post(&self) -> Option<Post> {
        self.record.as_ref().map(|record| Post {
            uri: self.uri.clone(),
            cid: self.cid.clone(),
            author: self.author.clone(),
            record: record.clone(),
            indexed_at: self.indexed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_round_trip_and_replyable() {
        for s in ["mention", "reply", "like", "repost", "follow", "quote", "starterpack-joined"] {
            assert_eq!(NotificationReason::from_str(s).as_str(), s);
        }
        assert!(NotificationReason::Mention.is_replyable());
        assert!(NotificationReason::Reply.is_replyable());
        assert!(!NotificationReason::Quote.is_replyable());
        assert!(!NotificationReason::Other("mention ".to_string()).is_replyable());
    }
}
