use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{history::History, AppError, AppResult, AppState};

#[derive(Deserialize)]
pub(crate) struct SendBody {
    #[serde(rename = "senderID")]
    sender_id: Option<String>,
    #[serde(rename = "receiverID")]
    receiver_id: Option<String>,
    content: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    State(history): State<History>,
    Json(SendBody { sender_id, receiver_id, content }): Json<SendBody>,
) -> AppResult<Response> {
    let message = history
        .append_direct_message(sender_id.as_deref(), receiver_id.as_deref(), content.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Message sent successfully", "data": message })),
    )
        .into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn conversation(
    Path((user1, user2)): Path<(String, String)>,
    State(history): State<History>,
) -> AppResult<Response> {
    let messages = history.list_direct_messages(&user1, &user2).await?;
    if messages.is_empty() {
        return Err(AppError::NotFound("messages"));
    }

    Ok(Json(json!({ "messages": messages })).into_response())
}
