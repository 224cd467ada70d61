use std::sync::LazyLock;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    extract::State,
    response::{Html, Redirect},
};
use axum_extra::extract::{CookieJar, WithRejection};
use tracing::{info, warn};

use parlor_types::forms::{LoginForm, RegisterForm};

use crate::error::AppError;
use crate::middleware::{
    SESSION_COOKIE, cleared_session_cookie, new_session_token, session_cookie, token_digest,
};
use crate::state::{AppState, run_db};
use crate::templates::{LoginTemplate, RegisterTemplate, render};
use crate::ValidForm;

/// Verified against when the username is unknown, so a failed login costs the
/// same Argon2 work whether or not the account exists.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"parlor-absent-user", &salt)
        .map(|hash| hash.to_string())
        .ok()
});

pub async fn register_form() -> Result<Html<String>, AppError> {
    render(RegisterTemplate { nav_user: None })
}

/// Create an account. No session is started; the user logs in next.
pub async fn register(
    State(state): State<AppState>,
    WithRejection(axum::Form(form), _): ValidForm<RegisterForm>,
) -> Result<Redirect, AppError> {
    form.validate().map_err(AppError::invalid)?;

    let password_hash = hash_password(form.password.clone()).await?;

    let username = form.username().to_string();
    let stored_name = username.clone();
    let user_id = run_db(&state, move |db| {
        db.create_user(&stored_name, &password_hash, &form.color)
    })
    .await?;

    info!("Registered user {} (id {})", username, user_id);
    Ok(Redirect::to("/login"))
}

pub async fn login_form() -> Result<Html<String>, AppError> {
    render(LoginTemplate { nav_user: None })
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(axum::Form(form), _): ValidForm<LoginForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    let username = form.username().to_string();
    let lookup = username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&lookup)).await?;

    let stored_hash = user.as_ref().map(|u| u.password.clone());
    if !verify_password(form.password, stored_hash).await? {
        warn!("Failed login for {}", username);
        return Err(AppError::InvalidCredentials);
    }
    let user = user.ok_or(AppError::InvalidCredentials)?;

    let token = new_session_token();
    let digest = token_digest(&token);
    let user_id = user.id;
    run_db(&state, move |db| {
        db.create_session(&digest, user_id, chrono::Utc::now())
    })
    .await?;

    info!("User {} logged in", user.username);
    let jar = jar.add(session_cookie(token, state.secure_cookies));
    Ok((jar, Redirect::to("/")))
}

/// Drop the server-side session and the cookie that pointed at it.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let digest = token_digest(cookie.value());
        run_db(&state, move |db| db.delete_session(&digest)).await?;
    }

    Ok((jar.remove(cleared_session_cookie()), Redirect::to("/login")))
}

// Argon2 is deliberately slow, so both directions run on the blocking pool.

async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("Password hashing failed: {}", e))
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?
    .map_err(AppError::Internal)
}

/// `None` stands for an unknown user: the dummy hash is checked and the
/// result is always `false`.
async fn verify_password(password: String, stored_hash: Option<String>) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let Some(stored_hash) = stored_hash else {
            if let Some(parsed) = DUMMY_HASH.as_deref().and_then(|h| PasswordHash::new(h).ok()) {
                let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
            }
            return Ok(false);
        };

        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| anyhow!("Stored password hash is malformed: {}", e))?;
        Ok::<_, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?
    .map_err(AppError::Internal)
}
