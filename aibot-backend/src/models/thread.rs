use super::post::Post;

/// A post together with its ancestor chain and its direct replies.
///
/// The parent chain is exclusively owned and therefore acyclic; a missing
/// parent marks the root (or the point where the server truncated the
/// chain). `replies` only holds direct replies and is used for the
/// already-answered check, never for flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    pub post: Post,
    pub parent: Option<Box<ThreadNode>>,
    pub replies: Vec<ThreadNode>,
}

impl ThreadNode {
    pub fn new(post: Post) -> Self {
        Self {
            post,
            parent: None,
            replies: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_parent(mut self, parent: ThreadNode) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn with_replies(mut self, replies: Vec<ThreadNode>) -> Self {
        self.replies = replies;
        self
    }

    /// Number of ancestors above this node.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self;
        while let Some(parent) = node.parent.as_deref() {
            depth += 1;
            node = parent;
        }
        depth
    }
}
