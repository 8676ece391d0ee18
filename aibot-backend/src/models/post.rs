use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Strong reference to a post: its AT URI plus content identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

impl PostRef {
    pub fn new(uri: impl Into<String>, cid: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            cid: cid.into(),
        }
    }
}

/// The `{root, parent}` pair a reply carries to attach to its thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: PostRef,
    pub parent: PostRef,
}

/// Inline `#mention` annotation. Byte offsets index the UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionFacet {
    pub did: String,
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub did: String,
    pub handle: String,
    /// Never `Some("")`; blank display names are dropped at the wire boundary.
    pub display_name: Option<String>,
}

/// The record part of a post: what the author wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub text: String,
    /// Author-asserted creation time.
    pub created_at: DateTime<Utc>,
    pub reply: Option<ReplyRef>,
    pub mentions: Vec<MentionFacet>,
}

/// Read-only snapshot of a post as observed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    pub record: PostRecord,
    /// Server-observed indexing time; the canonical ordering key.
    pub indexed_at: DateTime<Utc>,
}

impl Post {
    pub fn as_ref(&self) -> PostRef {
        PostRef::new(self.uri.clone(), self.cid.clone())
    }

    pub fn text(&self) -> &str {
        &self.record.text
    }

    pub fn is_authored_by(&self, did: &str) -> bool {
        self.author.did == did
    }
}

/// A home-timeline entry: the post plus who authored the post it replies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub post: Post,
    pub parent_author_did: Option<String>,
}
