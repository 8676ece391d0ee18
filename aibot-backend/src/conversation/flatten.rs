//! Parent-chain flattening.
//!
//! Walks from the leaf up through its ancestors with an explicit loop and a
//! depth guard, then publishes the chain root-first.

use std::collections::HashSet;

use crate::error::BotError;
use crate::models::{Post, ThreadNode};

/// Maximum number of ancestors followed above the leaf. Also used as the
/// `parentHeight` requested from the server.
pub const MAX_THREAD_DEPTH: usize = 100;

/// Flatten a thread into its posts, root first, leaf last.
///
/// An absent thread yields an empty list. Chains deeper than
/// [`MAX_THREAD_DEPTH`], or chains that revisit a post, are rejected.
pub fn flatten(thread: Option<&ThreadNode>) -> Result<Vec<Post>, BotError> {
    flatten_with_limit(thread, MAX_THREAD_DEPTH)
}

pub fn flatten_with_limit(thread: Option<&ThreadNode>, max_depth: usize) -> Result<Vec<Post>, BotError> {
    let Some(leaf) = thread else {
        return Ok(Vec::new());
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut posts = Vec::new();
    let mut node = Some(leaf);
    let mut depth = 0;

    while let Some(current) = node {
        if depth > max_depth {
            return Err(BotError::malformed(format!(
                "parent chain of {} exceeds {} ancestors",
                leaf.post.uri, max_depth
            )));
        }
        if !seen.insert(current.post.uri.as_str()) {
            return Err(BotError::malformed(format!(
                "post {} appears twice in the parent chain of {}",
                current.post.uri, leaf.post.uri
            )));
        }
        posts.push(current.post.clone());
        node = current.parent.as_deref();
        depth += 1;
    }

    posts.reverse();
    Ok(posts)
}
