pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use auth::Authenticator;
use config::Config;
use gateway::fanout::FanoutBridge;
use gateway::gatekeeper::Gatekeeper;
use gateway::session::ConnectionManager;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gatekeeper: Arc<Gatekeeper>,
    pub auth: Authenticator,
    pub connections: Arc<ConnectionManager>,
    pub bridge: Option<Arc<FanoutBridge>>,
    pub instance_id: String,
}
