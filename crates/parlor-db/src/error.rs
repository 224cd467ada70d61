use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("username already exists")]
    DuplicateUsername,

    #[error("row not found")]
    NotFound,

    #[error("row belongs to another user")]
    Forbidden,

    #[error("parent comment is missing or on another post")]
    InvalidParent,

    #[error("store connection busy")]
    Busy,

    #[error("DB lock poisoned: {0}")]
    Poisoned(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
