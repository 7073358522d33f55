use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use time::OffsetDateTime;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS forums (
        uuid TEXT PRIMARY KEY NOT NULL,
        id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        image TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        device_id TEXT NOT NULL
    )",
    // list order is rowid order
    "CREATE TABLE IF NOT EXISTS connected_users (
        owner_id TEXT NOT NULL,
        peer_id TEXT NOT NULL,
        UNIQUE (owner_id, peer_id)
    )",
    "CREATE TABLE IF NOT EXISTS room_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        username TEXT NOT NULL,
        content TEXT NOT NULL,
        forum_id TEXT NOT NULL REFERENCES forums (uuid),
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS room_messages_forum ON room_messages (forum_id, created_at)",
    "CREATE INDEX IF NOT EXISTS room_messages_user ON room_messages (user_id, created_at)",
    "CREATE TABLE IF NOT EXISTS direct_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sender_id TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS direct_messages_sender ON direct_messages (sender_id, created_at)",
];

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(database_url)
        .await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

/// A single-connection in-memory database. Every `sqlite::memory:` connection
/// is its own database, so the pool must never open a second one.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    Ok(())
}

pub(crate) fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(millis: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
