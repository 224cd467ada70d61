//! Reply-tree assembly for a post's comments.
//!
//! The store hands back every comment of a post in a single query; the tree
//! is put together here instead of fetching replies node by node.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::Comment;

#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

/// A comment paired with its nesting depth (0 for top-level).
#[derive(Debug, Clone)]
pub struct ThreadEntry {
    pub comment: Comment,
    pub depth: usize,
}

/// Build the reply forest for one post. Sibling order follows the input
/// order, so callers sort the flat list first.
pub fn build(comments: Vec<Comment>) -> Vec<CommentNode> {
    let mut children: HashMap<i64, Vec<Comment>> = HashMap::new();
    let mut roots = Vec::new();

    for comment in comments {
        match comment.parent_id {
            Some(parent) => children.entry(parent).or_default().push(comment),
            None => roots.push(comment),
        }
    }

    roots
        .into_iter()
        .map(|root| attach(root, &mut children))
        .collect()
}

// Each child list is removed as it is consumed, so a malformed parent cycle
// cannot recurse forever.
fn attach(comment: Comment, children: &mut HashMap<i64, Vec<Comment>>) -> CommentNode {
    let replies = children
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|reply| attach(reply, children))
        .collect();

    CommentNode { comment, replies }
}

/// Pre-order walk of the forest, for templates that render a flat list with
/// indentation.
pub fn flatten(nodes: Vec<CommentNode>) -> Vec<ThreadEntry> {
    let mut out = Vec::new();
    for node in nodes {
        push_entries(node, 0, &mut out);
    }
    out
}

fn push_entries(node: CommentNode, depth: usize, out: &mut Vec<ThreadEntry>) {
    out.push(ThreadEntry { comment: node.comment, depth });
    for reply in node.replies {
        push_entries(reply, depth + 1, out);
    }
}
