//! Purges users who have been idle past [`IDLE_THRESHOLD`].
//!
//! A purge deletes message history, then the user record, then back-references
//! in other users' contact lists, inside one transaction. A failed purge leaves
//! the user untouched, so running it again finishes the job.

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;

use crate::{history::History, AppError, AppResult};

pub const IDLE_THRESHOLD: Duration = Duration::minutes(10);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Purged {
    pub username: String,
    #[serde(rename = "userID")]
    pub user_id: i64,
    #[serde(rename = "roomMessages")]
    pub room_messages: u64,
    #[serde(rename = "directMessages")]
    pub direct_messages: u64,
    #[serde(rename = "backReferences")]
    pub back_references: u64,
}

#[derive(Clone)]
pub struct Reclaimer {
    history: History,
}

impl Reclaimer {
    pub fn new(history: History) -> Self {
        Self { history }
    }

    pub async fn reclaim(&self, username: &str) -> AppResult<Purged> {
        self.reclaim_at(username, OffsetDateTime::now_utc()).await
    }

    pub async fn reclaim_at(&self, username: &str, now: OffsetDateTime) -> AppResult<Purged> {
        let user = self
            .history
            .find_user_by_username(username)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        let user_id = user.identifier();

        let last_activity = self.history.last_activity(&user_id).await?.ok_or(AppError::NoActivity)?;
        if now - last_activity <= IDLE_THRESHOLD {
            return Err(AppError::TooRecent);
        }

        tracing::info!(username, user_id = %user_id, %last_activity, "purging idle user");

        let (room_messages, direct_messages, back_references) = self.history.purge_user(&user).await?;

        tracing::info!(username, room_messages, direct_messages, back_references, "user purged");
        Ok(Purged {
            username: user.username,
            user_id: user.id,
            room_messages,
            direct_messages,
            back_references,
        })
    }

    /// Runs the reclaimer over every known user, skipping the ones the gate refuses.
    pub async fn sweep(&self) -> AppResult<Vec<Purged>> {
        let now = OffsetDateTime::now_utc();
        let mut purged = Vec::new();
        for user in self.history.list_users().await? {
            match self.reclaim_at(&user.username, now).await {
                Ok(done) => purged.push(done),
                Err(AppError::NoActivity | AppError::TooRecent | AppError::NotFound(_)) => {}
                Err(err) => {
                    tracing::warn!(username = %user.username, error = %err, "reclamation failed");
                }
            }
        }
        Ok(purged)
    }
}

pub fn spawn_periodic(reclaimer: Reclaimer, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match reclaimer.sweep().await {
                Ok(purged) if !purged.is_empty() => {
                    tracing::info!(purged = purged.len(), "reclamation sweep finished");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "reclamation sweep failed"),
            }
        }
    })
}
