use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{history::History, reclaim::Reclaimer, AppError, AppResult, AppState};

#[derive(Deserialize)]
pub(crate) struct NewUserBody {
    username: Option<String>,
    #[serde(rename = "deviceId")]
    device_id: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_new_user(
    State(history): State<History>,
    Json(NewUserBody { username, device_id }): Json<NewUserBody>,
) -> AppResult<Response> {
    let user = history.register_user(username.as_deref(), device_id.as_deref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User added successfully", "user": user })),
    )
        .into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn get_user(
    Path(identifier): Path<String>,
    State(history): State<History>,
) -> AppResult<Response> {
    let user = history.find_user(&identifier).await?.ok_or(AppError::NotFound("user"))?;
    Ok(Json(json!({ "user": user })).into_response())
}

#[derive(Deserialize)]
pub(crate) struct AddConnectedBody {
    username: Option<String>,
    #[serde(rename = "userIDToAdd")]
    user_id_to_add: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_connected_user(
    State(history): State<History>,
    Json(AddConnectedBody { username, user_id_to_add }): Json<AddConnectedBody>,
) -> AppResult<Response> {
    let connected_users = history
        .add_connected_user(username.as_deref(), user_id_to_add.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Connected user added successfully.",
        "connectedUsers": connected_users,
    }))
    .into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn connected_users(
    Path(username): Path<String>,
    State(history): State<History>,
) -> AppResult<Response> {
    let connected_users = history.list_connected_users(&username).await?;
    Ok(Json(json!({ "connectedUsers": connected_users })).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn cleanup_user(
    Path(username): Path<String>,
    State(reclaimer): State<Reclaimer>,
) -> AppResult<Response> {
    let purged = reclaimer.reclaim(&username).await?;
    Ok(Json(json!({
        "message": "User and all associated data removed successfully",
        "purged": purged,
    }))
    .into_response())
}
