use axum::{
    Extension,
    extract::{Path, State},
    response::{Html, Redirect},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;

use parlor_db::DbError;
use parlor_types::forms::{CommentForm, EditCommentForm};
use parlor_types::thread;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_db};
use crate::templates::{EditCommentTemplate, PostTemplate, render};
use crate::{ValidForm, ValidPath};

/// GET /post/{post_id} — the post and its whole comment thread, fetched in
/// one query and arranged into a reply tree here.
pub async fn view_post(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(Path(post_id), _): ValidPath<i64>,
) -> Result<Html<String>, AppError> {
    let (post, comments) = run_db(&state, move |db| {
        let post = db.get_post(post_id)?.ok_or(DbError::NotFound)?;
        let comments = db.list_comments(post_id)?;
        Ok((post, comments))
    })
    .await?;

    render(PostTemplate {
        nav_user: Some(me.username),
        viewer_id: me.id,
        post,
        thread: thread::flatten(thread::build(comments)),
    })
}

/// POST /post/{post_id} — add a top-level comment, or a reply when the form
/// carries `parent_id`.
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(Path(post_id), _): ValidPath<i64>,
    WithRejection(axum::Form(form), _): ValidForm<CommentForm>,
) -> Result<Redirect, AppError> {
    form.validate().map_err(AppError::invalid)?;
    let parent_id = form.parent_id().map_err(AppError::invalid)?;

    run_db(&state, move |db| {
        db.create_comment(me.id, post_id, &form.content, parent_id, Utc::now())
    })
    .await?;

    Ok(Redirect::to(&format!("/post/{}", post_id)))
}

/// POST /delete_comment/{comment_id} — owner only; replies go with it.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(Path(comment_id), _): ValidPath<i64>,
) -> Result<Redirect, AppError> {
    let post_id = run_db(&state, move |db| db.delete_comment(me.id, comment_id)).await?;

    Ok(Redirect::to(&format!("/post/{}", post_id)))
}

pub async fn edit_comment_form(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(Path(comment_id), _): ValidPath<i64>,
) -> Result<Html<String>, AppError> {
    let comment = run_db(&state, move |db| db.get_comment(comment_id))
        .await?
        .ok_or(AppError::NotFound)?;

    if comment.user_id != me.id {
        return Err(AppError::Forbidden);
    }

    render(EditCommentTemplate {
        nav_user: Some(me.username),
        comment,
    })
}

/// POST /edit_comment/{comment_id} — owner only. Concurrent edits of the same
/// comment are last-writer-wins.
pub async fn edit_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(Path(comment_id), _): ValidPath<i64>,
    WithRejection(axum::Form(form), _): ValidForm<EditCommentForm>,
) -> Result<Redirect, AppError> {
    form.validate().map_err(AppError::invalid)?;

    let post_id = run_db(&state, move |db| {
        db.edit_comment(me.id, comment_id, &form.content)
    })
    .await?;

    Ok(Redirect::to(&format!("/post/{}", post_id)))
}
