//! Turns a flattened thread into role-tagged chat messages.

use crate::models::{ConversationMessage, MessageRole, Post};

/// Longest identifier the completion API accepts for a speaker name.
pub const MAX_SPEAKER_NAME_CHARS: usize = 64;

/// Fallback for a handle that sanitises to nothing.
const ANONYMOUS_SPEAKER: &str = "user";

/// Build the conversation for `posts` as seen by the bot `bot_did`.
///
/// Posts are ordered by server index time with a stable sort, so posts
/// indexed at the same instant keep their incoming order. One message is
/// emitted per post; nothing is injected (the system prompt belongs to
/// the completion call).
pub fn build(posts: &[Post], bot_did: &str) -> Vec<ConversationMessage> {
    let mut ordered: Vec<&Post> = posts.iter().collect();
    ordered.sort_by_key(|post| post.indexed_at);

    ordered
        .into_iter()
        .map(|post| ConversationMessage {
            role: role_for(post, bot_did),
            content: post.text().to_string(),
            speaker_name: speaker_name(post),
        })
        .collect()
}

fn role_for(post: &Post, bot_did: &str) -> MessageRole {
    if post.is_authored_by(bot_did) {
        MessageRole::Assistant
    } else {
        MessageRole::User
    }
}

/// Display name when the author set one, otherwise the normalised handle.
pub fn speaker_name(post: &Post) -> String {
    match post.author.display_name.as_deref() {
        Some(name) => name.to_string(),
        None => normalize_identifier(&post.author.handle),
    }
}

/// Rewrite `raw` to satisfy `^[a-zA-Z0-9_-]{1,64}$`.
///
/// Disallowed characters (the `.` separators of a handle, mostly) become
/// `_`, the result is truncated to 64 characters, and an empty input maps to
/// a fixed placeholder. Normalising an already-normalised name is a no-op.
pub fn normalize_identifier(raw: &str) -> String {
    let normalized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(MAX_SPEAKER_NAME_CHARS)
        .collect();

    if normalized.is_empty() {
        ANONYMOUS_SPEAKER.to_string()
    } else {
        normalized
    }
}
