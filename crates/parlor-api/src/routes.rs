use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, chat, comments, posts};

/// Every route of the application. Anything outside register/login sits
/// behind the session check.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login));

    let protected_routes = Router::new()
        .route("/", get(posts::home))
        .route("/logout", get(auth::logout))
        .route("/create_post", get(posts::create_post_form).post(posts::create_post))
        .route("/my_page", get(posts::my_page))
        .route("/chat", get(chat::chat_page).post(chat::post_message))
        .route("/post/{post_id}", get(comments::view_post).post(comments::add_comment))
        .route("/delete_comment/{comment_id}", post(comments::delete_comment))
        .route(
            "/edit_comment/{comment_id}",
            get(comments::edit_comment_form).post(comments::edit_comment),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
