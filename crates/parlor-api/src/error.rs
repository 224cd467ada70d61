use askama::Template;
use axum::extract::rejection::{FormRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use thiserror::Error;
use tracing::{error, warn};

use parlor_db::DbError;

use crate::templates::ErrorTemplate;

/// Every failure a handler can return. Each maps to one status code and is
/// rendered as an HTML error page, except `Unauthenticated`, which sends the
/// browser to the login form.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Unauthorized action")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Reply target must be a comment on the same post")]
    InvalidParent,

    #[error("{0}")]
    Validation(String),

    #[error("The store is not responding, try again shortly")]
    StoreTimeout,

    #[error("Internal server error")]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn invalid(reason: &str) -> Self {
        Self::Validation(reason.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateUsername => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Unauthenticated => StatusCode::SEE_OTHER,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidParent | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::StoreTimeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateUsername => Self::DuplicateUsername,
            DbError::NotFound => Self::NotFound,
            DbError::Forbidden => Self::Forbidden,
            DbError::InvalidParent => Self::InvalidParent,
            DbError::Busy => Self::StoreTimeout,
            other => Self::Internal(other.into()),
        }
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        Self::NotFound
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::Unauthenticated => return Redirect::to("/login").into_response(),
            Self::Internal(e) => error!("Request failed: {:#}", e),
            Self::Forbidden => warn!("Rejected action on a row owned by another user"),
            _ => {}
        }

        let status = self.status();
        let message = self.to_string();
        let page = ErrorTemplate {
            nav_user: None,
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Error"),
            message: message.clone(),
        };

        match page.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                error!("Failed to render error page: {}", e);
                (status, message).into_response()
            }
        }
    }
}
