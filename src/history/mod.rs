//! Persistence boundary for forums, users and both message kinds.
//!
//! No business logic lives here beyond field validation; the relay and the
//! reclaimer decide what to write and when.

mod forums;
mod messages;
mod users;

use sqlx::SqlitePool;

pub use forums::{Forum, NewForum};
pub use messages::{DirectMessage, RoomMessage};
pub use users::User;

#[derive(Clone)]
pub struct History {
    db_pool: SqlitePool,
}

impl History {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
pub(crate) async fn test_history() -> History {
    History::new(crate::db::connect_in_memory().await.unwrap())
}

#[cfg(test)]
impl History {
    pub(crate) async fn execute_raw(&self, sql: &str) {
        sqlx::query(sql).execute(&self.db_pool).await.unwrap();
    }
}
