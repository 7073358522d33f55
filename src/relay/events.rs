//! Wire shapes of the relay protocol.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Inbound frames are validated here, so nothing past this module sees a
//! payload with a missing target or body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{appresult::require, AppResult};

use super::registry::OnlineUser;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
enum RawClientEvent {
    #[serde(rename = "fetch users")]
    FetchUsers,
    #[serde(rename = "join room")]
    JoinRoom(Option<String>),
    #[serde(rename = "private message")]
    RoomMessage(RawRoomMessage),
    #[serde(rename = "individual message")]
    DirectMessage(RawDirectMessage),
}

#[derive(Debug, Deserialize)]
struct RawRoomMessage {
    content: Option<String>,
    room: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawDirectMessage {
    content: Option<String>,
    to: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    FetchUsers,
    JoinRoom { room: String },
    RoomMessage { room: String, content: String, created_at: Option<Value> },
    DirectMessage { to: String, content: String },
}

impl ClientEvent {
    pub fn parse(frame: &str) -> AppResult<Self> {
        Ok(match serde_json::from_str::<RawClientEvent>(frame)? {
            RawClientEvent::FetchUsers => Self::FetchUsers,
            RawClientEvent::JoinRoom(room) => Self::JoinRoom {
                room: require(room.as_deref(), "room")?.to_owned(),
            },
            RawClientEvent::RoomMessage(RawRoomMessage { content, room, created_at }) => Self::RoomMessage {
                room: require(room.as_deref(), "room")?.to_owned(),
                content: require(content.as_deref(), "content")?.to_owned(),
                created_at: created_at.filter(|at| !at.is_null()),
            },
            RawClientEvent::DirectMessage(RawDirectMessage { content, to }) => Self::DirectMessage {
                to: require(to.as_deref(), "to")?.to_owned(),
                content: require(content.as_deref(), "content")?.to_owned(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub content: String,
    pub from: String,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "users")]
    Users(Vec<OnlineUser>),
    #[serde(rename = "private message")]
    Message(Delivery),
}

impl ServerEvent {
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
