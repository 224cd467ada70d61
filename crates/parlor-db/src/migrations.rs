use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Timestamps are fixed-width RFC 3339 UTC text, so ORDER BY on the
        // column is chronological.
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                color       TEXT NOT NULL
            );

            CREATE TABLE posts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                user_id     INTEGER NOT NULL REFERENCES users(id)
            );

            CREATE INDEX idx_posts_created ON posts(created_at);
            CREATE INDEX idx_posts_user ON posts(user_id, created_at);

            -- Deleting a comment takes its whole reply subtree with it.
            CREATE TABLE comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                post_id     INTEGER NOT NULL REFERENCES posts(id),
                user_id     INTEGER NOT NULL REFERENCES users(id),
                parent_id   INTEGER REFERENCES comments(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);
            CREATE INDEX idx_comments_parent ON comments(parent_id);

            CREATE TABLE messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                content     TEXT NOT NULL CHECK (length(content) <= 500),
                created_at  TEXT NOT NULL,
                user_id     INTEGER NOT NULL REFERENCES users(id)
            );

            CREATE INDEX idx_messages_created ON messages(created_at);

            -- Only the SHA-256 of the cookie token is stored.
            CREATE TABLE sessions (
                token_hash  TEXT PRIMARY KEY,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
