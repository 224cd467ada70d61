use parlor_types::models::User;

/// Full `users` row, including the password hash. Only the auth handlers
/// see this; everything else works with [`User`].
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub color: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            color: row.color,
        }
    }
}
