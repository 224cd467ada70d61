pub mod auth;
pub mod chat;
pub mod comments;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod routes;
pub mod state;
pub mod templates;

use axum::extract::{Form, Path};
use axum_extra::extract::WithRejection;

pub use error::AppError;
pub use routes::router;
pub use state::{AppState, AppStateInner};

/// Form body whose decoding failures surface as [`AppError`].
pub type ValidForm<T> = WithRejection<Form<T>, AppError>;

/// Path parameter whose parsing failures surface as [`AppError`].
pub type ValidPath<T> = WithRejection<Path<T>, AppError>;
