use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. The password hash never leaves the store layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub author: String,
    pub author_color: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A comment on a post. `parent_id` is `None` for top-level comments and
/// otherwise names a comment on the same post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub author: String,
    pub author_color: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A chat log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub user_id: i64,
    pub author: String,
    pub author_color: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
