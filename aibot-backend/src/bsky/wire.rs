//! XRPC response shapes and their conversion into the core models.
//!
//! Optional fields are resolved here once, so nothing past this module
//! touches raw JSON.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::conversation::MAX_THREAD_DEPTH;
use crate::error::BotError;
use crate::models::{
    Author, FeedItem, MentionFacet, Notification, NotificationReason, Post, PostRecord, PostRef, Profile,
    ReplyRef, ThreadNode,
};

pub const POST_RECORD_TYPE: &str = "app.bsky.feed.post";
pub const FOLLOW_RECORD_TYPE: &str = "app.bsky.graph.follow";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_jwt: String,
    pub handle: String,
    pub did: String,
}

#[derive(Debug, Deserialize)]
pub struct XrpcErrorResponse {
    pub error: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ProfileView {
    fn non_blank_display_name(&self) -> Option<String> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    pub fn into_author(self) -> Author {
        let display_name = self.non_blank_display_name();
        Author {
            did: self.did,
            handle: self.handle,
            display_name,
        }
    }

    pub fn into_profile(self) -> Profile {
        let display_name = self.non_blank_display_name();
        Profile {
            did: self.did,
            handle: self.handle,
            display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FollowersResponse {
    #[serde(default)]
    pub followers: Vec<ProfileView>,
}

#[derive(Debug, Deserialize)]
pub struct FollowsResponse {
    #[serde(default)]
    pub follows: Vec<ProfileView>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordResponse {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

impl From<StrongRef> for PostRef {
    fn from(r: StrongRef) -> Self {
        PostRef::new(r.uri, r.cid)
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplyRefRecord {
    pub root: StrongRef,
    pub parent: StrongRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention { did: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct Facet {
    pub index: ByteSlice,
    #[serde(default)]
    pub features: Vec<FacetFeature>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecordWire {
    #[serde(default)]
    pub text: String,
    pub created_at: String,
    #[serde(default)]
    pub reply: Option<ReplyRefRecord>,
    #[serde(default)]
    pub facets: Option<Vec<Facet>>,
}

impl PostRecordWire {
    pub fn from_value(value: Value) -> Result<Self, BotError> {
        serde_json::from_value(value).map_err(|e| BotError::malformed(format!("Invalid post record: {}", e)))
    }

    pub fn into_record(self) -> Result<PostRecord, BotError> {
        let created_at = parse_timestamp(&self.created_at)?;
        let mentions = self
            .facets
            .unwrap_or_default()
            .into_iter()
            .flat_map(|facet| {
                let (start, end) = (facet.index.byte_start, facet.index.byte_end);
                facet.features.into_iter().filter_map(move |feature| match feature {
                    FacetFeature::Mention { did } => Some(MentionFacet {
                        did,
                        byte_start: start,
                        byte_end: end,
                    }),
                    FacetFeature::Other => None,
                })
            })
            .collect();

        Ok(PostRecord {
            text: self.text,
            created_at,
            reply: self.reply.map(|r| ReplyRef {
                root: r.root.into(),
                parent: r.parent.into(),
            }),
            mentions,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: ProfileView,
    pub record: Value,
    pub indexed_at: String,
}

impl TryFrom<PostView> for Post {
    type Error = BotError;

    fn try_from(view: PostView) -> Result<Self, Self::Error> {
        let indexed_at = parse_timestamp(&view.indexed_at)?;
        let record = PostRecordWire::from_value(view.record)
            .and_then(PostRecordWire::into_record)
            .map_err(|e| BotError::malformed(format!("{} ({})", e, view.uri)))?;
        Ok(Post {
            uri: view.uri,
            cid: view.cid,
            author: view.author.into_author(),
            record,
            indexed_at,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub uri: String,
    pub cid: String,
    pub author: ProfileView,
    pub reason: String,
    #[serde(default)]
    pub record: Value,
    #[serde(default)]
    pub is_read: bool,
    pub indexed_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsResponse {
    #[serde(default)]
    pub notifications: Vec<NotificationView>,
}

impl TryFrom<NotificationView> for Notification {
    type Error = BotError;

    fn try_from(view: NotificationView) -> Result<Self, Self::Error> {
        let reason = NotificationReason::from_str(&view.reason);
        let is_post = view.record.get("$type").and_then(Value::as_str) == Some(POST_RECORD_TYPE);

        let record = if is_post || reason.is_replyable() {
            let record = PostRecordWire::from_value(view.record)
                .and_then(PostRecordWire::into_record)
                .map_err(|e| BotError::malformed(format!("{} ({})", e, view.uri)))?;
            Some(record)
        } else {
            None
        };

        Ok(Notification {
            indexed_at: parse_timestamp(&view.indexed_at)?,
            uri: view.uri,
            cid: view.cid,
            reason,
            author: view.author.into_author(),
            record,
            is_read: view.is_read,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedViewPost {
    pub post: PostView,
    #[serde(default)]
    pub reply: Option<FeedReply>,
}

/// `root`/`parent` are open unions (post, not found, blocked); only the
/// parent author's DID is needed.
#[derive(Debug, Deserialize)]
pub struct FeedReply {
    #[serde(default)]
    pub parent: Value,
}

#[derive(Debug, Deserialize)]
pub struct TimelineResponse {
    #[serde(default)]
    pub feed: Vec<FeedViewPost>,
}

impl TryFrom<FeedViewPost> for FeedItem {
    type Error = BotError;

    fn try_from(view: FeedViewPost) -> Result<Self, Self::Error> {
        let parent_author_did = view.reply.and_then(|reply| {
            reply
                .parent
                .get("author")
                .and_then(|author| author.get("did"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        Ok(FeedItem {
            post: view.post.try_into()?,
            parent_author_did,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct GetPostThreadResponse {
    pub thread: ThreadUnion,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "$type")]
pub enum ThreadUnion {
    #[serde(rename = "app.bsky.feed.defs#threadViewPost")]
    Post(ThreadViewPost),
    #[serde(rename = "app.bsky.feed.defs#notFoundPost")]
    NotFound,
    #[serde(rename = "app.bsky.feed.defs#blockedPost")]
    Blocked,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct ThreadViewPost {
    pub post: PostView,
    #[serde(default)]
    pub parent: Option<Box<ThreadUnion>>,
    #[serde(default)]
    pub replies: Option<Vec<ThreadUnion>>,
}

impl ThreadUnion {
    /// Convert into a [`ThreadNode`] without recursing over the parent chain.
    ///
    /// A leaf that is not a visible post yields `None`. An ancestor that is
    /// not visible ends the chain there (partial thread). Only direct
    /// replies of each node are kept; a reply that fails to convert is
    /// dropped rather than failing the thread.
    pub fn into_thread(self) -> Result<Option<ThreadNode>, BotError> {
        let mut chain: Vec<ThreadViewPost> = Vec::new();
        let mut cursor = Some(self);

        while let Some(union) = cursor {
            match union {
                ThreadUnion::Post(mut view) => {
                    if chain.len() > MAX_THREAD_DEPTH {
                        return Err(BotError::malformed(format!(
                            "Thread exceeds {} ancestors",
                            MAX_THREAD_DEPTH
                        )));
                    }
                    cursor = view.parent.take().map(|parent| *parent);
                    chain.push(view);
                }
                ThreadUnion::NotFound | ThreadUnion::Blocked | ThreadUnion::Unknown => cursor = None,
            }
        }

        let mut node: Option<ThreadNode> = None;
        for view in chain.into_iter().rev() {
            let replies = view
                .replies
                .unwrap_or_default()
                .into_iter()
                .filter_map(|reply| match reply {
                    ThreadUnion::Post(reply) => Some(reply.post),
                    _ => None,
                })
                .filter_map(|post| match Post::try_from(post) {
                    Ok(post) => Some(ThreadNode::new(post)),
                    Err(e) => {
                        log::warn!("Bluesky: Ignoring unreadable reply: {}", e);
                        None
                    }
                })
                .collect();

            let mut current = ThreadNode::new(Post::try_from(view.post)?).with_replies(replies);
            current.parent = node.map(Box::new);
            node = Some(current);
        }

        Ok(node)
    }
}

/// Parse an RFC 3339 timestamp. Offsets without a colon (`+0000`) are
/// accepted and naive ISO-8601 values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, BotError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| BotError::malformed(format!("Invalid timestamp {:?}: {}", raw, e)))
}
