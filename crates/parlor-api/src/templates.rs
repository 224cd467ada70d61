//! Askama page templates. `nav_user` is the signed-in username shown in the
//! navigation bar of `base.html`, or `None` on the public pages.

use askama::Template;
use axum::response::Html;

use parlor_types::models::{Comment, Message, Post, User};
use parlor_types::thread::ThreadEntry;

use crate::error::AppError;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub nav_user: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub nav_user: Option<String>,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nav_user: Option<String>,
    pub posts: Vec<Post>,
}

#[derive(Template)]
#[template(path = "create_post.html")]
pub struct CreatePostTemplate {
    pub nav_user: Option<String>,
}

#[derive(Template)]
#[template(path = "my_page.html")]
pub struct MyPageTemplate {
    pub nav_user: Option<String>,
    pub user: User,
    pub posts: Vec<Post>,
}

/// A post with its comment thread flattened in display order.
#[derive(Template)]
#[template(path = "view_post.html")]
pub struct PostTemplate {
    pub nav_user: Option<String>,
    pub viewer_id: i64,
    pub post: Post,
    pub thread: Vec<ThreadEntry>,
}

#[derive(Template)]
#[template(path = "edit_comment.html")]
pub struct EditCommentTemplate {
    pub nav_user: Option<String>,
    pub comment: Comment,
}

#[derive(Template)]
#[template(path = "chat.html")]
pub struct ChatTemplate {
    pub nav_user: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub nav_user: Option<String>,
    pub status: u16,
    pub reason: &'static str,
    pub message: String,
}

pub fn render<T: Template>(page: T) -> Result<Html<String>, AppError> {
    page.render()
        .map(Html)
        .map_err(|e| AppError::Internal(e.into()))
}
