//! Server configuration, read from the environment (and `.env` when present).

use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    /// Allowed CORS origin, or `*` for any.
    pub cors_origin: String,
    /// Log filter directive (e.g. `info`, `forumrelay=debug`).
    pub log_filter: String,
    /// Interval of the background reclamation sweep; disabled when unset.
    pub reclaim_interval: Option<Duration>,
}

impl Config {
    /// | Variable | Default |
    /// |---|---|
    /// | `DATABASE_URL` | `sqlite:forumrelay.db?mode=rwc` |
    /// | `LISTEN_ADDR` | `0.0.0.0:4200` |
    /// | `CORS_ORIGIN` | `http://localhost:3000` |
    /// | `LOG_FILTER` | `info` |
    /// | `RECLAIM_INTERVAL_SECS` | *(none)* |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| dotenv::var(key).ok())
    }

    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = env("DATABASE_URL").unwrap_or_else(|| "sqlite:forumrelay.db?mode=rwc".into());
        let listen_addr = env("LISTEN_ADDR")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 4200)));
        let cors_origin = env("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".into());
        let log_filter = env("LOG_FILTER").unwrap_or_else(|| "info".into());
        let reclaim_interval = env("RECLAIM_INTERVAL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self { database_url, listen_addr, cors_origin, log_filter, reclaim_interval }
    }
}
