use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    history::{History, NewForum},
    AppError, AppResult, AppState,
};

#[debug_handler(state = AppState)]
pub(crate) async fn list_forums(State(history): State<History>) -> AppResult<Response> {
    Ok(Json(history.list_forums().await?).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_forum(
    State(history): State<History>,
    Json(new): Json<NewForum>,
) -> AppResult<Response> {
    let forum = history.create_forum(&new).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Forum post created successfully", "forum": forum })),
    )
        .into_response())
}

#[derive(Deserialize)]
pub(crate) struct SaveMessageBody {
    #[serde(rename = "userID")]
    user_id: Option<String>,
    username: Option<String>,
    content: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn save_message(
    Path(forum_id): Path<String>,
    State(history): State<History>,
    Json(SaveMessageBody { user_id, username, content }): Json<SaveMessageBody>,
) -> AppResult<Response> {
    let message = history
        .append_room_message(
            &forum_id,
            user_id.as_deref().unwrap_or_default(),
            username.as_deref().unwrap_or_default(),
            content.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Message saved successfully", "data": message })),
    )
        .into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_messages(
    Path(forum_id): Path<String>,
    State(history): State<History>,
) -> AppResult<Response> {
    let messages = history.list_room_messages(&forum_id).await?;
    if messages.is_empty() {
        return Err(AppError::NotFound("messages"));
    }

    Ok(Json(messages).into_response())
}
