use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use super::wire::{
    CreateRecordResponse, FollowersResponse, FollowsResponse, GetPostThreadResponse, ListNotificationsResponse,
    SessionResponse, TimelineResponse, XrpcErrorResponse, FOLLOW_RECORD_TYPE, POST_RECORD_TYPE,
};
use super::SocialGraph;
use crate::error::BotError;
use crate::models::{FeedItem, Notification, PostRef, Profile, ReplyRef, ThreadNode};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Thread ancestry requested per fetch.
const THREAD_PARENT_HEIGHT: u32 = 100;
/// Only direct replies are needed for the already-answered check.
const THREAD_DEPTH: u32 = 1;

const LIST_LIMIT: u32 = 50;

#[derive(Debug, Clone)]
struct Session {
    did: String,
    handle: String,
    access_jwt: String,
}

/// XRPC client bound to one account.
pub struct BskyClient {
    client: Client,
    service_url: String,
    identifier: String,
    password: String,
    session: RwLock<Option<Session>>,
}

impl BskyClient {
    pub fn new(service_url: &str, identifier: &str, password: &str) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            service_url: service_url.trim_end_matches('/').to_string(),
            identifier: identifier.to_string(),
            password: password.to_string(),
            session: RwLock::new(None),
        })
    }

    fn xrpc_url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service_url, nsid)
    }

    fn session(&self) -> Result<Session, BotError> {
        self.session.read().clone().ok_or_else(|| BotError::Api {
            status: StatusCode::UNAUTHORIZED.as_u16(),
            message: "AuthMissing: no active session".to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, nsid: &str, query: &[(&str, String)]) -> Result<T, BotError> {
        let session = self.session()?;
        let response = self
            .client
            .get(self.xrpc_url(nsid))
            .bearer_auth(&session.access_jwt)
            .query(query)
            .send()
            .await?;
        Self::read_json(nsid, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, nsid: &str, body: &B) -> Result<T, BotError> {
        let session = self.session()?;
        let response = self
            .client
            .post(self.xrpc_url(nsid))
            .bearer_auth(&session.access_jwt)
            .json(body)
            .send()
            .await?;
        Self::read_json(nsid, response).await
    }

    /// For procedures that answer with an empty body.
    async fn post_unit<B: Serialize + ?Sized>(&self, nsid: &str, body: &B) -> Result<(), BotError> {
        let session = self.session()?;
        let response = self
            .client
            .post(self.xrpc_url(nsid))
            .bearer_auth(&session.access_jwt)
            .json(body)
            .send()
            .await?;
        Self::read_body(nsid, response).await.map(|_| ())
    }

    async fn read_body(nsid: &str, response: Response) -> Result<String, BotError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        log::debug!("Bluesky: {} failed ({}): {}", nsid, status, body);
        let message = match serde_json::from_str::<XrpcErrorResponse>(&body) {
            Ok(err) => format!(
                "{}: {}",
                err.error.unwrap_or_else(|| "Error".to_string()),
                err.message.unwrap_or_default()
            ),
            Err(_) => body,
        };
        Err(BotError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_json<T: DeserializeOwned>(nsid: &str, response: Response) -> Result<T, BotError> {
        let body = Self::read_body(nsid, response).await?;
        serde_json::from_str(&body).map_err(|e| BotError::malformed(format!("Failed to parse {} response: {}", nsid, e)))
    }

    async fn list_profiles<R: DeserializeOwned>(&self, nsid: &str, actor: &str) -> Result<R, BotError> {
        self.get(nsid, &[("actor", actor.to_string()), ("limit", LIST_LIMIT.to_string())])
            .await
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl SocialGraph for BskyClient {
    async fn login(&self) -> Result<String, BotError> {
        let nsid = "com.atproto.server.createSession";
        let response = self
            .client
            .post(self.xrpc_url(nsid))
            .json(&json!({ "identifier": self.identifier, "password": self.password }))
            .send()
            .await?;
        let created: SessionResponse = Self::read_json(nsid, response).await?;

        log::info!("Bluesky: Logged in as @{} ({})", created.handle, created.did);
        let did = created.did.clone();
        *self.session.write() = Some(Session {
            did: created.did,
            handle: created.handle,
            access_jwt: created.access_jwt,
        });
        Ok(did)
    }

    async fn get_followers(&self, actor: &str) -> Result<Vec<Profile>, BotError> {
        let response: FollowersResponse = self.list_profiles("app.bsky.graph.getFollowers", actor).await?;
        Ok(response.followers.into_iter().map(|p| p.into_profile()).collect())
    }

    async fn get_follows(&self, actor: &str) -> Result<Vec<Profile>, BotError> {
        let response: FollowsResponse = self.list_profiles("app.bsky.graph.getFollows", actor).await?;
        Ok(response.follows.into_iter().map(|p| p.into_profile()).collect())
    }

    async fn create_follow(&self, subject_did: &str) -> Result<(), BotError> {
        let session = self.session()?;
        let body = json!({
            "repo": session.did,
            "collection": FOLLOW_RECORD_TYPE,
            "record": {
                "$type": FOLLOW_RECORD_TYPE,
                "subject": subject_did,
                "createdAt": timestamp(Utc::now()),
            }
        });
        let _: CreateRecordResponse = self.post("com.atproto.repo.createRecord", &body).await?;
        Ok(())
    }

    async fn get_notifications(&self) -> Result<Vec<Notification>, BotError> {
        let response: ListNotificationsResponse = self
            .get("app.bsky.notification.listNotifications", &[("limit", LIST_LIMIT.to_string())])
            .await?;

        let mut notifications = Vec::with_capacity(response.notifications.len());
        for view in response.notifications {
            let uri = view.uri.clone();
            match Notification::try_from(view) {
                Ok(n) => notifications.push(n),
                Err(e) => log::warn!("Bluesky: Dropping notification {}: {}", uri, e),
            }
        }
        Ok(notifications)
    }

    async fn update_seen(&self, seen_at: DateTime<Utc>) -> Result<(), BotError> {
        self.post_unit(
            "app.bsky.notification.updateSeen",
            &json!({ "seenAt": timestamp(seen_at) }),
        )
        .await
    }

    async fn get_timeline(&self) -> Result<Vec<FeedItem>, BotError> {
        let response: TimelineResponse = self
            .get("app.bsky.feed.getTimeline", &[("limit", LIST_LIMIT.to_string())])
            .await?;

        let mut items = Vec::with_capacity(response.feed.len());
        for view in response.feed {
            let uri = view.post.uri.clone();
            match FeedItem::try_from(view) {
                Ok(item) => items.push(item),
                Err(e) => log::warn!("Bluesky: Dropping timeline post {}: {}", uri, e),
            }
        }
        Ok(items)
    }

    async fn get_post_thread(&self, uri: &str) -> Result<Option<ThreadNode>, BotError> {
        let query = [
            ("uri", uri.to_string()),
            ("depth", THREAD_DEPTH.to_string()),
            ("parentHeight", THREAD_PARENT_HEIGHT.to_string()),
        ];
        let response: GetPostThreadResponse = match self.get("app.bsky.feed.getPostThread", &query).await {
            Ok(response) => response,
            Err(BotError::Api { status: 400, message }) if message.starts_with("NotFound") => {
                log::debug!("Bluesky: Thread {} not found", uri);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        response.thread.into_thread()
    }

    async fn publish_reply(&self, text: &str, addressing: &ReplyRef) -> Result<PostRef, BotError> {
        let session = self.session()?;
        let body = json!({
            "repo": session.did,
            "collection": POST_RECORD_TYPE,
            "record": {
                "$type": POST_RECORD_TYPE,
                "text": text,
                "createdAt": timestamp(Utc::now()),
                "reply": {
                    "root": { "uri": addressing.root.uri, "cid": addressing.root.cid },
                    "parent": { "uri": addressing.parent.uri, "cid": addressing.parent.cid },
                }
            }
        });
        let created: CreateRecordResponse = self.post("com.atproto.repo.createRecord", &body).await?;
        log::debug!("Bluesky: @{} published {}", session.handle, created.uri);
        Ok(created.into())
    }
}

impl From<CreateRecordResponse> for PostRef {
    fn from(r: CreateRecordResponse) -> Self {
        PostRef::new(r.uri, r.cid)
    }
}
