//! Room membership for this gateway instance.
//!
//! Room → members lives here behind one mutex; each connection's own room set
//! lives in its [`ConnectionState`] and is updated in the same call, so the
//! two views never disagree. A room entry exists only while it has members.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::broadcast::{fan_out, Outbound, Payload};
use super::session::{ConnectionId, ConnectionState};

/// Namespace for restaurant rooms.
pub const ROOM_PREFIX: &str = "restaurant:";

/// Deterministic room name for a restaurant.
pub fn room_name(restaurant_id: &str) -> String {
    format!("{ROOM_PREFIX}{restaurant_id}")
}

type Members = HashMap<ConnectionId, Outbound>;

/// Shared registry of rooms and their member connections.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Members>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Add the connection to `room`. Idempotent; returns `true` if it was not
    /// already a member.
    pub fn join(&self, conn: &mut ConnectionState, room: &str) -> bool {
        let mut rooms = self.rooms.lock();
        let added = rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn.id.clone(), conn.outbound.clone())
            .is_none();
        conn.rooms.insert(room.to_string());
        added
    }

    /// Remove the connection from `room`, deleting the room if it empties.
    /// Returns `true` if it was a member.
    pub fn leave(&self, conn: &mut ConnectionState, room: &str) -> bool {
        let mut rooms = self.rooms.lock();
        conn.rooms.remove(room);
        remove_member(&mut rooms, room, &conn.id)
    }

    /// Leave every room the connection is in and clear its room set.
    /// Returns the number of rooms left.
    pub fn leave_all(&self, conn: &mut ConnectionState) -> usize {
        let mut rooms = self.rooms.lock();
        let id = conn.id.clone();
        conn.rooms
            .drain()
            .filter(|room| remove_member(&mut rooms, room, &id))
            .count()
    }

    /// Send `payload` verbatim to every open member of `room`.
    pub fn broadcast(&self, room: &str, payload: &Payload) -> usize {
        let rooms = self.rooms.lock();
        match rooms.get(room) {
            Some(members) => fan_out(members.values(), payload),
            None => 0,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }

    pub fn room_names(&self) -> Vec<String> {
        self.rooms.lock().keys().cloned().collect()
    }

    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .lock()
            .get(room)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, room: &str, id: &ConnectionId) -> bool {
        self.rooms
            .lock()
            .get(room)
            .is_some_and(|members| members.contains_key(id))
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_member(rooms: &mut HashMap<String, Members>, room: &str, id: &ConnectionId) -> bool {
    let Some(members) = rooms.get_mut(room) else {
        return false;
    };
    let removed = members.remove(id).is_some();
    if members.is_empty() {
        rooms.remove(room);
    }
    removed
}
