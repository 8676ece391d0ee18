//! Reply addressing and mention detection.

use crate::models::{FeedItem, Post, ReplyRef};

/// Network-side post length limit, in characters.
pub const MAX_POST_CHARS: usize = 300;

/// Where a reply to `post` must attach.
///
/// The parent is always `post` itself. The root is carried over from the
/// post's own reply reference, or is `post` when it starts its thread.
pub fn addressing_for(post: &Post) -> ReplyRef {
    let parent = post.as_ref();
    let root = match &post.record.reply {
        Some(existing) => existing.root.clone(),
        None => parent.clone(),
    };
    ReplyRef { root, parent }
}

/// True when `post` carries a mention facet for `did`.
pub fn has_mention_of(post: &Post, did: &str) -> bool {
    post.record.mentions.iter().any(|facet| facet.did == did)
}

/// True when a timeline item replies directly to a post by `did`.
pub fn is_reply_to(item: &FeedItem, did: &str) -> bool {
    item.parent_author_did.as_deref() == Some(did)
}

/// Prepare completion output for publishing.
///
/// Returns `None` for a blank completion. Text over the post limit is cut
/// on a character boundary and ends with an ellipsis.
pub fn prepare_reply_text(completion: &str) -> Option<String> {
    let text = completion.trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= MAX_POST_CHARS {
        return Some(text.to_string());
    }
    let truncated: String = text.chars().take(MAX_POST_CHARS - 1).collect();
    Some(format!("{}…", truncated.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{alice, bot, mentioning, post, reply_to, BOT_DID};

    #[test]
    fn test_addressing_for_thread_root() {
        let p1 = post("p1", alice(), "@aibot hi", 0);
        let addressing = addressing_for(&p1);
        assert_eq!(addressing.parent, p1.as_ref());
        assert_eq!(addressing.root, addressing.parent);
    }

    #[test]
    fn test_addressing_for_nested_reply() {
        let p1 = post("p1", alice(), "question", 0);
        let p2 = reply_to(post("p2", bot(), "answer", 10), &p1, &p1);
        let p3 = reply_to(post("p3", alice(), "follow-up", 20), &p1, &p2);

        let addressing = addressing_for(&p3);
        assert_eq!(addressing.root, p1.as_ref());
        assert_eq!(addressing.parent, p3.as_ref());
    }

    #[test]
    fn test_mention_detection() {
        let plain = post("p1", alice(), "no facets", 0);
        assert!(!has_mention_of(&plain, BOT_DID));

        let mentioned = mentioning(plain.clone(), BOT_DID);
        assert!(has_mention_of(&mentioned, BOT_DID));

        let other = mentioning(plain, "did:plc:someoneelse");
        assert!(!has_mention_of(&other, BOT_DID));
    }

    #[test]
    fn test_prepare_reply_text() {
        assert_eq!(prepare_reply_text("  \n "), None);
        assert_eq!(prepare_reply_text("  Hello!  "), Some("Hello!".to_string()));

        let long = "あ".repeat(400);
        let prepared = prepare_reply_text(&long).unwrap();
        assert_eq!(prepared.chars().count(), MAX_POST_CHARS);
        assert!(prepared.ends_with('…'));

        let exact = "a".repeat(MAX_POST_CHARS);
        assert_eq!(prepare_reply_text(&exact), Some(exact.clone()));
    }
}
