use serde::Serialize;

use crate::{appresult::require, AppError, AppResult};

use super::{is_unique_violation, History};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    #[serde(rename = "userID")]
    pub id: i64,
    pub username: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "connectedUsers")]
    pub connected_users: Vec<String>,
}

impl User {
    /// The stable identifier messages and contact lists refer to.
    pub fn identifier(&self) -> String {
        self.id.to_string()
    }
}

impl History {
    pub async fn register_user(&self, username: Option<&str>, device_id: Option<&str>) -> AppResult<User> {
        let username = require(username, "username")?;
        let device_id = require(device_id, "deviceId")?;

        if self.find_user_by_username(username).await?.is_some() {
            return Err(AppError::UsernameTaken);
        }

        let (id,): (i64,) = sqlx::query_as("INSERT INTO users (username,device_id) VALUES (?,?) RETURNING id")
            .bind(username)
            .bind(device_id)
            .fetch_one(&self.db_pool)
            .await
            .map_err(|err| if is_unique_violation(&err) { AppError::UsernameTaken } else { err.into() })?;

        tracing::info!(user_id = id, username, "user registered");
        Ok(User {
            id,
            username: username.to_owned(),
            device_id: device_id.to_owned(),
            connected_users: Vec::new(),
        })
    }

    pub async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id,username,device_id FROM users WHERE username=?")
                .bind(username)
                .fetch_optional(&self.db_pool)
                .await?;
        self.hydrate(row).await
    }

    pub async fn find_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id,username,device_id FROM users WHERE id=?")
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?;
        self.hydrate(row).await
    }

    /// Numeric identifiers are looked up by id, anything else by username.
    pub async fn find_user(&self, identifier: &str) -> AppResult<Option<User>> {
        match identifier.parse::<i64>() {
            Ok(id) => self.find_user_by_id(id).await,
            Err(_) => self.find_user_by_username(identifier).await,
        }
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as("SELECT id,username,device_id FROM users ORDER BY id")
            .fetch_all(&self.db_pool)
            .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.extend(self.hydrate(Some(row)).await?);
        }
        Ok(users)
    }

    async fn hydrate(&self, row: Option<(i64, String, String)>) -> AppResult<Option<User>> {
        let Some((id, username, device_id)) = row else {
            return Ok(None);
        };
        let connected_users = self.connected_user_ids(&id.to_string()).await?;
        Ok(Some(User { id, username, device_id, connected_users }))
    }

    async fn connected_user_ids(&self, owner_id: &str) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT peer_id FROM connected_users WHERE owner_id=? ORDER BY rowid")
                .bind(owner_id)
                .fetch_all(&self.db_pool)
                .await?;
        Ok(rows.into_iter().map(|(peer_id,)| peer_id).collect())
    }

    /// Appends `peer_id` to the contact list of `username`, returning the new list.
    pub async fn add_connected_user(&self, username: Option<&str>, peer_id: Option<&str>) -> AppResult<Vec<String>> {
        let username = require(username, "username")?;
        let peer_id = require(peer_id, "userIDToAdd")?;

        let user = self
            .find_user_by_username(username)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        let owner_id = user.identifier();
        if owner_id == peer_id {
            return Err(AppError::InvalidIdentifier);
        }

        sqlx::query("INSERT INTO connected_users (owner_id,peer_id) VALUES (?,?)")
            .bind(&owner_id)
            .bind(peer_id)
            .execute(&self.db_pool)
            .await
            .map_err(|err| if is_unique_violation(&err) { AppError::AlreadyConnected } else { err.into() })?;

        self.connected_user_ids(&owner_id).await
    }

    /// Full records of everyone on the contact list of `username`, in list order.
    pub async fn list_connected_users(&self, username: &str) -> AppResult<Vec<User>> {
        let user = self
            .find_user_by_username(username)
            .await?
            .ok_or(AppError::NotFound("user"))?;

        let mut peers = Vec::with_capacity(user.connected_users.len());
        for peer_id in &user.connected_users {
            let Ok(id) = peer_id.parse::<i64>() else {
                continue;
            };
            peers.extend(self.find_user_by_id(id).await?);
        }
        Ok(peers)
    }

    /// Removes everything `user` sent, the user record with its own contact
    /// list, and every reference to it in other contact lists, all in one
    /// transaction. Returns the room message, direct message and back-reference
    /// counts.
    pub(crate) async fn purge_user(&self, user: &User) -> AppResult<(u64, u64, u64)> {
        let user_id = user.identifier();
        let mut tx = self.db_pool.begin().await?;

        let room_messages = sqlx::query("DELETE FROM room_messages WHERE user_id=?")
            .bind(&user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let direct_messages = sqlx::query("DELETE FROM direct_messages WHERE sender_id=?")
            .bind(&user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM connected_users WHERE owner_id=?")
            .bind(&user_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM users WHERE id=?")
            .bind(user.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        // someone else purged it first; dropping `tx` rolls back
        if deleted == 0 {
            return Err(AppError::NotFound("user"));
        }

        let back_references = sqlx::query("DELETE FROM connected_users WHERE peer_id=?")
            .bind(&user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok((room_messages, direct_messages, back_references))
    }
}
