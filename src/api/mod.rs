mod forums;
mod messages;
mod users;

use axum::{routing::{delete, get, post}, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/forums", get(forums::list_forums).post(forums::create_forum))
        .route("/forums/{forum_id}/messages", get(forums::list_messages).post(forums::save_message))
        .route("/api/messages/send", post(messages::send))
        .route("/api/messages/{user1}/{user2}", get(messages::conversation))
        .route("/addnewuser", post(users::add_new_user))
        .route("/getuser/{identifier}", get(users::get_user))
        .route("/add-connected-user", post(users::add_connected_user))
        .route("/connected-users/{username}", get(users::connected_users))
        .route("/cleanup-user/{username}", delete(users::cleanup_user))
}
