use std::sync::Arc;

use tracing::error;

use parlor_db::{Database, DbError};

use crate::error::AppError;

pub type AppState = Arc<AppStateInner>;

/// Everything a handler needs, built once in `main` and shared through
/// axum's `State`.
pub struct AppStateInner {
    pub db: Database,
    /// Mark the session cookie `Secure` (set when served over HTTPS)
    pub secure_cookies: bool,
}

/// Run a store call on the blocking pool. The wait for the connection is
/// bounded inside `Database`; once a call starts it is never abandoned, so a
/// `StoreTimeout` always means nothing was written.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    let shared = state.clone();
    match tokio::task::spawn_blocking(move || f(&shared.db)).await {
        Ok(result) => result.map_err(AppError::from),
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            Err(AppError::Internal(e.into()))
        }
    }
}
