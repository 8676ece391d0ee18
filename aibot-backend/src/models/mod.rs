pub mod message;
pub mod notification;
pub mod post;
pub mod thread;

#[cfg(test)]
pub mod fixtures;

pub use message::{ConversationMessage, MessageRole};
pub use notification::{Notification, NotificationReason};
pub use post::{Author, FeedItem, MentionFacet, Post, PostRecord, PostRef, ReplyRef};
pub use thread::ThreadNode;

/// Account as listed by the follower/follows endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
}
