pub mod health;

use axum::Router;

use crate::gateway::server;
use crate::AppState;

/// Full HTTP surface: health check, the gateway endpoint, and a silent
/// rejection for everything else.
pub fn router(gateway_path: &str) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(server::router(gateway_path))
        .fallback(server::reject)
}
