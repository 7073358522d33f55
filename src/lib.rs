pub mod api;
pub mod appresult;
pub mod config;
pub mod db;
pub mod history;
pub mod reclaim;
pub mod relay;

use axum::{extract::FromRef, http::HeaderValue, Router};
use tower_http::cors::{Any, CorsLayer};

pub use appresult::{AppError, AppResult};
use history::History;
use reclaim::Reclaimer;
use relay::{Registry, Relay};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub history: History,
    pub relay: Relay,
    pub reclaimer: Reclaimer,
}

impl AppState {
    /// Wires the registry, relay and reclaimer around one store and starts the
    /// presence broadcaster. Must be called inside a tokio runtime.
    pub fn new(history: History) -> Self {
        let registry = Registry::new();
        relay::spawn_presence_broadcaster(registry.clone());

        Self {
            relay: Relay::new(registry, history.clone()),
            reclaimer: Reclaimer::new(history.clone()),
            history,
        }
    }

    pub fn registry(&self) -> &Registry {
        self.relay.registry()
    }
}

pub fn app(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let cors = match cors_origin {
        "*" => cors.allow_origin(Any),
        origin => match HeaderValue::from_str(origin) {
            Ok(origin) => cors.allow_origin(origin),
            Err(_) => {
                tracing::warn!(origin, "ignoring unparsable CORS origin");
                cors
            }
        },
    };

    Router::new()
        .merge(api::router())
        .merge(relay::router())
        .with_state(state)
        .layer(cors)
}
