use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid identifier")]
    InvalidIdentifier,
    #[error("room does not reference an existing forum")]
    InvalidRoomReference,
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("user has no messages")]
    NoActivity,
    #[error("user's last message was sent within the idle threshold")]
    TooRecent,
    #[error("user is already connected")]
    AlreadyConnected,
    #[error("username already exists")]
    UsernameTaken,
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            InvalidIdentifier
            | InvalidRoomReference
            | Malformed(_)
            | MissingField(_)
            | AlreadyConnected
            | UsernameTaken
            | TooRecent => StatusCode::BAD_REQUEST,
            NotFound(_) | NoActivity => StatusCode::NOT_FOUND,
            Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

/// Rejects blank strings, naming the field on failure.
pub(crate) fn require<'a>(value: Option<&'a str>, field: &'static str) -> AppResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::MissingField(field)),
    }
}
