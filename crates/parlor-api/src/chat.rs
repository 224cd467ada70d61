use axum::{
    Extension,
    extract::State,
    response::{Html, Redirect},
};
use axum_extra::extract::WithRejection;

use parlor_types::forms::MessageForm;

use crate::ValidForm;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_db};
use crate::templates::{ChatTemplate, render};

/// GET /chat — the full log, oldest first. Clients reload to see new lines.
pub async fn chat_page(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<Html<String>, AppError> {
    let messages = run_db(&state, |db| db.list_messages()).await?;

    render(ChatTemplate {
        nav_user: Some(me.username),
        messages,
    })
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    WithRejection(axum::Form(form), _): ValidForm<MessageForm>,
) -> Result<Redirect, AppError> {
    form.validate().map_err(AppError::invalid)?;

    run_db(&state, move |db| {
        db.insert_message(me.id, &form.content, chrono::Utc::now())
    })
    .await?;

    Ok(Redirect::to("/chat"))
}
