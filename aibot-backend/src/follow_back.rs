//! Follow every follower the bot does not follow yet.

use std::collections::HashSet;

use crate::bsky::SocialGraph;
use crate::error::BotError;

/// Returns how many accounts were newly followed.
///
/// Listing failures are returned. A failed individual follow is logged and
/// the rest are still attempted.
pub async fn follow_back(social: &dyn SocialGraph, bot_did: &str) -> Result<usize, BotError> {
    let followers = social.get_followers(bot_did).await?;
    let following: HashSet<String> = social
        .get_follows(bot_did)
        .await?
        .into_iter()
        .map(|p| p.did)
        .collect();

    let mut followed = 0;
    for follower in followers {
        if follower.did == bot_did || following.contains(&follower.did) {
            continue;
        }
        match social.create_follow(&follower.did).await {
            Ok(()) => {
                log::info!("Bluesky: Followed back @{}", follower.handle);
                followed += 1;
            }
            Err(e) => log::warn!("Bluesky: Failed to follow @{}: {}", follower.handle, e),
        }
    }
    Ok(followed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsky::mock::{profile, MockSocialGraph};
    use crate::models::fixtures::BOT_DID;

    #[tokio::test]
    async fn test_follows_only_missing_followers() {
        let social = MockSocialGraph::new();
        *social.followers.lock() = vec![
            profile("did:plc:alice", "alice.bsky.social"),
            profile("did:plc:bob", "bob.bsky.social"),
            profile(BOT_DID, "aibot.bsky.social"),
        ];
        *social.follows.lock() = vec![profile("did:plc:alice", "alice.bsky.social")];

        let followed = follow_back(&social, BOT_DID).await.unwrap();
        assert_eq!(followed, 1);
        assert_eq!(*social.followed.lock(), vec!["did:plc:bob".to_string()]);

        // Second run has nothing left to do.
        assert_eq!(follow_back(&social, BOT_DID).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_individual_failure_does_not_stop_the_rest() {
        let social = MockSocialGraph::new();
        *social.followers.lock() = vec![
            profile("did:plc:bob", "bob.bsky.social"),
            profile("did:plc:carol", "carol.bsky.social"),
        ];
        social.follow_failures.lock().insert(
            "did:plc:bob".to_string(),
            BotError::Api { status: 400, message: "InvalidRequest: blocked".to_string() },
        );

        let followed = follow_back(&social, BOT_DID).await.unwrap();
        assert_eq!(followed, 1);
        assert_eq!(*social.followed.lock(), vec!["did:plc:carol".to_string()]);
    }
}
