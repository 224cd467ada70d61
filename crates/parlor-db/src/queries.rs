use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use parlor_types::models::{Comment, Message, Post, User};

use crate::models::UserRow;
use crate::{Database, DbError, Result};

const POST_COLUMNS: &str =
    "p.id, p.user_id, u.username, u.color, p.title, p.content, p.created_at";

const COMMENT_COLUMNS: &str =
    "c.id, c.post_id, c.user_id, c.parent_id, u.username, u.color, c.content, c.created_at";

const MESSAGE_COLUMNS: &str = "m.id, m.user_id, u.username, u.color, m.content, m.created_at";

impl Database {
    // -- Users --

    /// Insert a user and return its id. The caller hashes the password.
    pub fn create_user(&self, username: &str, password_hash: &str, color: &str) -> Result<i64> {
        self.with_conn(|conn| {
            if query_user_by_username(conn, username)?.is_some() {
                return Err(DbError::DuplicateUsername);
            }

            conn.execute(
                "INSERT INTO users (username, password, color) VALUES (?1, ?2, ?3)",
                params![username, password_hash, color],
            )
            .map_err(|e| {
                // Another writer won the race between the check and the insert
                if is_unique_violation(&e) {
                    DbError::DuplicateUsername
                } else {
                    e.into()
                }
            })?;

            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, username, color FROM users WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            color: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
    }

    pub fn count_users(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
    }

    // -- Sessions --

    pub fn create_session(&self, token_hash: &str, user_id: i64, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token_hash, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![token_hash, user_id, format_timestamp(now)],
            )?;
            Ok(())
        })
    }

    /// Resolve a session digest to the user it was issued for.
    pub fn get_session_user(&self, token_hash: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT u.id, u.username, u.color
                     FROM sessions s
                     JOIN users u ON u.id = s.user_id
                     WHERE s.token_hash = ?1",
                    [token_hash],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            color: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
    }

    /// Returns whether a session was actually removed.
    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
            Ok(removed > 0)
        })
    }

    // -- Posts --

    pub fn create_post(
        &self,
        user_id: i64,
        title: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (title, content, created_at, user_id) VALUES (?1, ?2, ?3, ?4)",
                params![title, content, format_timestamp(now), user_id],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Created post {} for user {}", id, user_id);
            Ok(id)
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<Post>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id WHERE p.id = ?1"
            );
            Ok(conn.query_row(&sql, [id], post_from_row).optional()?)
        })
    }

    /// Every post, newest first.
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS}
                 FROM posts p
                 JOIN users u ON u.id = p.user_id
                 ORDER BY p.created_at DESC, p.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], post_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// One user's posts, newest first.
    pub fn list_posts_by_user(&self, user_id: i64) -> Result<Vec<Post>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS}
                 FROM posts p
                 JOIN users u ON u.id = p.user_id
                 WHERE p.user_id = ?1
                 ORDER BY p.created_at DESC, p.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], post_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // -- Comments --

    /// Insert a comment or reply. The post must exist, and a parent, when
    /// given, must be a comment on that same post.
    pub fn create_comment(
        &self,
        user_id: i64,
        post_id: i64,
        content: &str,
        parent_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            let post_exists = conn
                .query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !post_exists {
                return Err(DbError::NotFound);
            }

            if let Some(parent_id) = parent_id {
                let parent_post: Option<i64> = conn
                    .query_row(
                        "SELECT post_id FROM comments WHERE id = ?1",
                        [parent_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if parent_post != Some(post_id) {
                    return Err(DbError::InvalidParent);
                }
            }

            conn.execute(
                "INSERT INTO comments (content, created_at, post_id, user_id, parent_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![content, format_timestamp(now), post_id, user_id, parent_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COMMENT_COLUMNS} FROM comments c JOIN users u ON u.id = c.user_id WHERE c.id = ?1"
            );
            Ok(conn.query_row(&sql, [id], comment_from_row).optional()?)
        })
    }

    /// Comments on a post that are not replies, newest first.
    pub fn list_top_level_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        self.query_comments("c.post_id = ?1 AND c.parent_id IS NULL", post_id)
    }

    /// Direct replies to a comment, newest first.
    pub fn list_replies(&self, comment_id: i64) -> Result<Vec<Comment>> {
        self.query_comments("c.parent_id = ?1", comment_id)
    }

    /// The whole thread of a post in one query, newest first. Feed this to
    /// `parlor_types::thread::build` to get the reply tree.
    pub fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        self.query_comments("c.post_id = ?1", post_id)
    }

    fn query_comments(&self, filter: &str, key: i64) -> Result<Vec<Comment>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COMMENT_COLUMNS}
                 FROM comments c
                 JOIN users u ON u.id = c.user_id
                 WHERE {filter}
                 ORDER BY c.created_at DESC, c.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([key], comment_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Replace a comment's content. Returns the post it belongs to.
    pub fn edit_comment(&self, user_id: i64, comment_id: i64, content: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let post_id = owned_comment(conn, user_id, comment_id)?;
            conn.execute(
                "UPDATE comments SET content = ?1 WHERE id = ?2",
                params![content, comment_id],
            )?;
            Ok(post_id)
        })
    }

    /// Delete a comment together with all of its replies. Returns the post
    /// it belonged to.
    pub fn delete_comment(&self, user_id: i64, comment_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let post_id = owned_comment(conn, user_id, comment_id)?;
            conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?;
            debug!("Deleted comment {} on post {}", comment_id, post_id);
            Ok(post_id)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, user_id: i64, content: &str, now: DateTime<Utc>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (content, created_at, user_id) VALUES (?1, ?2, ?3)",
                params![content, format_timestamp(now), user_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// The full chat log, oldest first.
    pub fn list_messages(&self) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            // JOIN users to fetch author name and color in a single query
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 JOIN users u ON u.id = m.user_id
                 ORDER BY m.created_at ASC, m.id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Message {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        author: row.get(2)?,
                        author_color: row.get(3)?,
                        content: row.get(4)?,
                        created_at: timestamp(row, 5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, username, password, color FROM users WHERE username = ?1",
            [username],
            |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password: row.get(2)?,
                    color: row.get(3)?,
                })
            },
        )
        .optional()?;

    Ok(row)
}

/// Look up a comment's post, failing unless `user_id` wrote it.
fn owned_comment(conn: &Connection, user_id: i64, comment_id: i64) -> Result<i64> {
    let (owner, post_id): (i64, i64) = conn
        .query_row(
            "SELECT user_id, post_id FROM comments WHERE id = ?1",
            [comment_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or(DbError::NotFound)?;

    if owner != user_id {
        return Err(DbError::Forbidden);
    }
    Ok(post_id)
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author: row.get(2)?,
        author_color: row.get(3)?,
        title: row.get(4)?,
        content: row.get(5)?,
        created_at: timestamp(row, 6)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        parent_id: row.get(3)?,
        author: row.get(4)?,
        author_color: row.get(5)?,
        content: row.get(6)?,
        created_at: timestamp(row, 7)?,
    })
}

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
