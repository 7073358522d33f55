use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    appresult::require,
    db::{from_millis, to_millis},
    AppError, AppResult,
};

use super::History;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomMessage {
    pub id: i64,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub username: String,
    pub content: String,
    #[serde(rename = "forumID")]
    pub forum_id: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectMessage {
    pub id: i64,
    #[serde(rename = "senderID")]
    pub sender_id: String,
    #[serde(rename = "receiverID")]
    pub receiver_id: String,
    pub content: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

type RoomRow = (i64, String, String, String, String, i64);
type DirectRow = (i64, String, String, String, i64);

fn room_message((id, user_id, username, content, forum_id, created_at): RoomRow) -> RoomMessage {
    RoomMessage { id, user_id, username, content, forum_id, created_at: from_millis(created_at) }
}

fn direct_message((id, sender_id, receiver_id, content, created_at): DirectRow) -> DirectMessage {
    DirectMessage { id, sender_id, receiver_id, content, created_at: from_millis(created_at) }
}

impl History {
    pub async fn append_room_message(
        &self,
        room_id: &str,
        user_id: &str,
        username: &str,
        content: &str,
    ) -> AppResult<RoomMessage> {
        self.append_room_message_at(room_id, user_id, username, content, OffsetDateTime::now_utc())
            .await
    }

    pub(crate) async fn append_room_message_at(
        &self,
        room_id: &str,
        user_id: &str,
        username: &str,
        content: &str,
        at: OffsetDateTime,
    ) -> AppResult<RoomMessage> {
        let user_id = require(Some(user_id), "userID")?;
        let username = require(Some(username), "username")?;
        let content = require(Some(content), "content")?;

        let forum_id = Uuid::parse_str(room_id.trim()).map_err(|_| AppError::InvalidRoomReference)?;
        if !self.forum_exists(forum_id).await? {
            return Err(AppError::InvalidRoomReference);
        }
        let forum_id = forum_id.to_string();

        // a sender's timestamps never run backwards, even if the wall clock does
        let (id, created_at): (i64, i64) = sqlx::query_as(
            "INSERT INTO room_messages (user_id,username,content,forum_id,created_at)
             VALUES (?,?,?,?,MAX(?, COALESCE((SELECT MAX(created_at) FROM room_messages WHERE user_id=?), 0)))
             RETURNING id,created_at",
        )
        .bind(user_id)
        .bind(username)
        .bind(content)
        .bind(&forum_id)
        .bind(to_millis(at))
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(RoomMessage {
            id,
            user_id: user_id.to_owned(),
            username: username.to_owned(),
            content: content.to_owned(),
            forum_id,
            created_at: from_millis(created_at),
        })
    }

    /// Oldest first. A room id that is not a forum uuid simply has no history.
    pub async fn list_room_messages(&self, room_id: &str) -> AppResult<Vec<RoomMessage>> {
        let Ok(forum_id) = Uuid::parse_str(room_id.trim()) else {
            return Ok(Vec::new());
        };

        let rows: Vec<RoomRow> = sqlx::query_as(
            "SELECT id,user_id,username,content,forum_id,created_at FROM room_messages
             WHERE forum_id=? ORDER BY created_at, id",
        )
        .bind(forum_id.to_string())
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(room_message).collect())
    }

    pub async fn append_direct_message(
        &self,
        sender_id: Option<&str>,
        receiver_id: Option<&str>,
        content: Option<&str>,
    ) -> AppResult<DirectMessage> {
        self.append_direct_message_at(sender_id, receiver_id, content, OffsetDateTime::now_utc())
            .await
    }

    pub(crate) async fn append_direct_message_at(
        &self,
        sender_id: Option<&str>,
        receiver_id: Option<&str>,
        content: Option<&str>,
        at: OffsetDateTime,
    ) -> AppResult<DirectMessage> {
        let sender_id = require(sender_id, "senderID")?;
        let receiver_id = require(receiver_id, "receiverID")?;
        let content = require(content, "content")?;

        let (id, created_at): (i64, i64) = sqlx::query_as(
            "INSERT INTO direct_messages (sender_id,receiver_id,content,created_at)
             VALUES (?,?,?,MAX(?, COALESCE((SELECT MAX(created_at) FROM direct_messages WHERE sender_id=?), 0)))
             RETURNING id,created_at",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .bind(to_millis(at))
        .bind(sender_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(DirectMessage {
            id,
            sender_id: sender_id.to_owned(),
            receiver_id: receiver_id.to_owned(),
            content: content.to_owned(),
            created_at: from_millis(created_at),
        })
    }

    /// Both directions of the conversation, oldest first.
    pub async fn list_direct_messages(&self, user_a: &str, user_b: &str) -> AppResult<Vec<DirectMessage>> {
        let rows: Vec<DirectRow> = sqlx::query_as(
            "SELECT id,sender_id,receiver_id,content,created_at FROM direct_messages
             WHERE (sender_id=? AND receiver_id=?) OR (sender_id=? AND receiver_id=?)
             ORDER BY created_at, id",
        )
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(direct_message).collect())
    }

    /// Latest message sent by `user_id` in either a forum or a direct conversation.
    pub async fn last_activity(&self, user_id: &str) -> AppResult<Option<OffsetDateTime>> {
        let (latest,): (Option<i64>,) = sqlx::query_as(
            "SELECT MAX(created_at) FROM (
                SELECT created_at FROM room_messages WHERE user_id=?
                UNION ALL
                SELECT created_at FROM direct_messages WHERE sender_id=?
            )",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(latest.map(from_millis))
    }
}
