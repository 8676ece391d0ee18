pub mod builder;
pub mod flatten;

pub use builder::{build, normalize_identifier};
pub use flatten::{flatten, MAX_THREAD_DEPTH};

use crate::error::BotError;
use crate::models::{ConversationMessage, ThreadNode};

/// Flatten a fetched thread and build its conversation for `bot_did`.
pub fn thread_to_messages(thread: Option<&ThreadNode>, bot_did: &str) -> Result<Vec<ConversationMessage>, BotError> {
    let posts = flatten(thread)?;
    Ok(build(&posts, bot_did))
}
