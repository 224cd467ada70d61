use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

use parlor_types::models::User;

use crate::error::AppError;
use crate::state::{AppState, run_db};

pub const SESSION_COOKIE: &str = "parlor_session";

/// The user a request's session cookie resolved to, inserted as a request
/// extension by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Resolve the session cookie to a user or send the browser to `/login`.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = current_user(&state, &jar).await?;
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

pub async fn current_user(state: &AppState, jar: &CookieJar) -> Result<User, AppError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or(AppError::Unauthenticated)?;

    let digest = token_digest(&token);
    run_db(state, move |db| db.get_session_user(&digest))
        .await?
        .ok_or(AppError::Unauthenticated)
}

/// 256 random bits, URL-safe base64. Only the client ever holds this value.
pub fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// What the `sessions` table stores in place of the token itself.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Matches the path of [`session_cookie`] so the browser drops it.
pub fn cleared_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}
