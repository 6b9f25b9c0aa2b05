//! Per-connection state and the lifecycle manager that owns it.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tableside_common::id::prefix;
use tableside_common::{now_millis, PrefixedId};
use tokio::sync::mpsc;

use super::broadcast::{Outbound, Payload};
use super::events::{ClientFrame, ServerFrame};
use super::handler::handle_frame;
use super::registry::RoomRegistry;
use crate::auth::Identity;

/// Identifier of one connection on this instance (`conn_` prefixed ULID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl PrefixedId for ConnectionId {
    const PREFIX: &'static str = prefix::CONNECTION;
}

impl ConnectionId {
    pub fn new() -> Self {
        Self(Self::generate())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a connection is in its life. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Anonymous,
    Authenticated,
    Closed,
}

/// State for a single WebSocket connection.
pub struct ConnectionState {
    pub(crate) id: ConnectionId,
    /// Fixed at handshake; `None` for anonymous clients.
    pub(crate) identity: Option<Identity>,
    /// Rooms this connection is currently a member of.
    pub(crate) rooms: HashSet<String>,
    pub(crate) outbound: Outbound,
}

impl ConnectionState {
    pub fn new(identity: Option<Identity>, outbound: Outbound) -> Self {
        Self {
            id: outbound.id().clone(),
            identity,
            rooms: HashSet::new(),
            outbound,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn rooms(&self) -> &HashSet<String> {
        &self.rooms
    }

    pub fn phase(&self) -> ConnectionPhase {
        if !self.outbound.is_open() {
            ConnectionPhase::Closed
        } else if self.identity.is_some() {
            ConnectionPhase::Authenticated
        } else {
            ConnectionPhase::Anonymous
        }
    }
}

/// A freshly registered connection, ready for its socket task.
pub struct OpenedConnection {
    pub id: ConnectionId,
    /// Greeting to send before anything else.
    pub hello: ServerFrame,
    /// Frames queued for this connection by broadcasts.
    pub outbound: mpsc::UnboundedReceiver<Payload>,
}

/// Owns every live connection's state, keyed by connection id.
///
/// Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
/// entry. Lock order is always connection entry, then room registry.
pub struct ConnectionManager {
    connections: DashMap<ConnectionId, Mutex<ConnectionState>>,
    rooms: Arc<RoomRegistry>,
    staff_roles: HashSet<String>,
}

impl ConnectionManager {
    pub fn new(rooms: Arc<RoomRegistry>, staff_roles: HashSet<String>) -> Self {
        Self {
            connections: DashMap::new(),
            rooms,
            staff_roles,
        }
    }

    /// Register a connection after a successful upgrade.
    pub fn open(&self, identity: Option<Identity>) -> OpenedConnection {
        let (outbound, rx) = Outbound::channel(ConnectionId::new());
        let hello = ServerFrame::Hello {
            ts: now_millis(),
            user: identity.clone(),
        };
        let state = ConnectionState::new(identity, outbound);
        let id = state.id.clone();
        self.connections.insert(id.clone(), Mutex::new(state));

        OpenedConnection {
            id,
            hello,
            outbound: rx,
        }
    }

    /// Handle one text frame from the client. Malformed or unknown frames
    /// yield no reply and leave the connection untouched.
    pub fn handle_text(&self, id: &ConnectionId, text: &str) -> Option<ServerFrame> {
        let Some(frame) = ClientFrame::parse(text) else {
            tracing::debug!(connection_id = %id, "ignoring malformed client frame");
            return None;
        };

        let entry = self.connections.get(id)?;
        let mut state = entry.lock();
        handle_frame(&self.rooms, &self.staff_roles, &mut state, frame)
    }

    /// Tear down a connection: stop deliveries, leave every room, forget it.
    /// Returns the number of rooms it was removed from.
    pub fn close(&self, id: &ConnectionId) -> usize {
        let Some((_, state)) = self.connections.remove(id) else {
            return 0;
        };
        let mut state = state.into_inner();
        state.outbound.mark_closing();
        self.rooms.leave_all(&mut state)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn phase_of(&self, id: &ConnectionId) -> ConnectionPhase {
        self.connections
            .get(id)
            .map(|entry| entry.lock().phase())
            .unwrap_or(ConnectionPhase::Closed)
    }

    /// Rooms the connection is in, or `None` once it is closed.
    pub fn rooms_of(&self, id: &ConnectionId) -> Option<HashSet<String>> {
        self.connections
            .get(id)
            .map(|entry| entry.lock().rooms.clone())
    }

    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }
}
