//! Realtime gateway: WebSocket clients grouped into per-restaurant rooms,
//! fed by domain events from this and other instances.

pub mod broadcast;
pub mod bus;
pub mod catalog;
pub mod emitter;
pub mod events;
pub mod fanout;
pub mod gatekeeper;
pub mod handler;
pub mod registry;
pub mod server;
pub mod session;

use std::sync::Arc;

use tableside_common::id::{prefix, prefixed_ulid};

use crate::auth::Authenticator;
use crate::config::Config;
use crate::error::EmitterError;
use crate::AppState;

use self::broadcast::LocalBroadcaster;
use self::bus::PubSubBus;
use self::emitter::Emitter;
use self::fanout::FanoutBridge;
use self::gatekeeper::Gatekeeper;
use self::registry::RoomRegistry;
use self::session::ConnectionManager;

/// A running gateway instance.
pub struct Gateway {
    /// Random per-process id stamped on every emitted envelope.
    pub instance_id: String,
    pub rooms: Arc<RoomRegistry>,
    pub connections: Arc<ConnectionManager>,
    pub bridge: Option<Arc<FanoutBridge>>,
    pub emitter: Emitter,
}

impl Gateway {
    /// Build the instance, try to bring up the fanout bridge, and bind
    /// `emitter` to it. An unreachable bus leaves the gateway single-instance.
    pub async fn start(
        config: &Config,
        bus: Option<Arc<dyn PubSubBus>>,
        emitter: Emitter,
    ) -> Result<Self, EmitterError> {
        let instance_id = prefixed_ulid(prefix::INSTANCE);
        let rooms = Arc::new(RoomRegistry::new());
        let local = LocalBroadcaster::new(rooms.clone());
        let connections = Arc::new(ConnectionManager::new(rooms.clone(), config.staff_roles.clone()));

        let bridge = match bus {
            Some(bus) => fanout::start_or_degrade(bus, local.clone(), &instance_id).await,
            None => {
                tracing::info!("no pub/sub bus configured; running single-instance");
                None
            }
        };

        emitter.bind(instance_id.clone(), local, bridge.clone())?;

        tracing::info!(%instance_id, fanout = bridge.is_some(), "gateway started");

        Ok(Self {
            instance_id,
            rooms,
            connections,
            bridge,
            emitter,
        })
    }

    /// Shared state for the HTTP router.
    pub fn app_state(&self, config: Config) -> AppState {
        AppState {
            gatekeeper: Arc::new(Gatekeeper::from_config(&config)),
            auth: Authenticator::new(&config.jwt_secret),
            connections: self.connections.clone(),
            bridge: self.bridge.clone(),
            instance_id: self.instance_id.clone(),
            config: Arc::new(config),
        }
    }
}
