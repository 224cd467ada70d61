use axum::{
    Extension,
    extract::State,
    response::{Html, Redirect},
};
use axum_extra::extract::WithRejection;

use parlor_types::forms::PostForm;

use crate::ValidForm;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_db};
use crate::templates::{CreatePostTemplate, HomeTemplate, MyPageTemplate, render};

/// GET / — every post, newest first. Unpaginated.
pub async fn home(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<Html<String>, AppError> {
    let posts = run_db(&state, |db| db.list_posts()).await?;

    render(HomeTemplate {
        nav_user: Some(me.username),
        posts,
    })
}

pub async fn create_post_form(
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<Html<String>, AppError> {
    render(CreatePostTemplate {
        nav_user: Some(me.username),
    })
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(axum::Form(form), _): ValidForm<PostForm>,
) -> Result<Redirect, AppError> {
    form.validate().map_err(AppError::invalid)?;

    run_db(&state, move |db| {
        db.create_post(me.id, &form.title, &form.content, chrono::Utc::now())
    })
    .await?;

    Ok(Redirect::to("/"))
}

/// GET /my_page — the signed-in user's profile and own posts.
pub async fn my_page(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<Html<String>, AppError> {
    let user_id = me.id;
    let posts = run_db(&state, move |db| db.list_posts_by_user(user_id)).await?;

    render(MyPageTemplate {
        nav_user: Some(me.username.clone()),
        user: me,
        posts,
    })
}
