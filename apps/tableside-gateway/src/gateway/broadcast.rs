//! Local broadcast engine: hands a serialized frame to every open member of
//! a room in this process.
//!
//! Delivery is fire-and-forget. Each connection owns an unbounded outbound
//! queue drained by its socket task; a member whose queue is gone or who is
//! closing is skipped without error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;

use super::registry::{room_name, RoomRegistry};
use super::session::ConnectionId;

/// A serialized frame. Cloning shares the underlying buffer, so one
/// serialization is fanned out to every recipient unchanged.
pub type Payload = Utf8Bytes;

/// Sending half of a connection, as referenced by room entries.
#[derive(Debug, Clone)]
pub struct Outbound {
    id: ConnectionId,
    open: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Payload>,
}

impl Outbound {
    /// Create the handle and the receiver its socket task drains.
    pub fn channel(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Payload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let outbound = Self {
            id,
            open: Arc::new(AtomicBool::new(true)),
            tx,
        };
        (outbound, rx)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Open means not yet closing and the socket task still draining.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// First step of close: concurrent broadcasts stop targeting this
    /// connection before its memberships are torn down.
    pub fn mark_closing(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Queue a payload. Returns `false` if the connection was not open.
    pub fn send(&self, payload: &Payload) -> bool {
        self.is_open() && self.tx.send(payload.clone()).is_ok()
    }
}

/// Send `payload` to every open member, in iteration order.
pub(crate) fn fan_out<'a>(members: impl IntoIterator<Item = &'a Outbound>, payload: &Payload) -> usize {
    members
        .into_iter()
        .filter(|member| member.send(payload))
        .count()
}

/// Process-local delivery into the room registry. Cloneable.
#[derive(Clone)]
pub struct LocalBroadcaster {
    rooms: Arc<RoomRegistry>,
}

impl LocalBroadcaster {
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        Self { rooms }
    }

    /// Deliver to one room. Missing or empty rooms are a no-op.
    pub fn deliver(&self, room: &str, payload: &Payload) -> usize {
        self.rooms.broadcast(room, payload)
    }

    /// Deliver to the room of a restaurant.
    pub fn deliver_to_restaurant(&self, restaurant_id: &str, payload: &Payload) -> usize {
        let room = room_name(restaurant_id);
        let delivered = self.deliver(&room, payload);
        tracing::trace!(%room, delivered, "local broadcast");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::session::ConnectionState;

    #[test]
    fn closing_connection_is_skipped() {
        let (open, mut open_rx) = Outbound::channel(ConnectionId::new());
        let (closing, mut closing_rx) = Outbound::channel(ConnectionId::new());
        closing.mark_closing();

        let payload = Payload::from("frame");
        assert_eq!(fan_out([&open, &closing], &payload), 1);
        assert_eq!(open_rx.try_recv().unwrap().as_str(), "frame");
        assert!(closing_rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_is_skipped() {
        let (gone, rx) = Outbound::channel(ConnectionId::new());
        drop(rx);
        assert!(!gone.is_open());
        assert!(!gone.send(&Payload::from("frame")));
    }

    #[test]
    fn deliver_to_restaurant_targets_its_room_only() {
        let rooms = Arc::new(RoomRegistry::new());
        let local = LocalBroadcaster::new(rooms.clone());

        let (out_a, mut rx_a) = Outbound::channel(ConnectionId::new());
        let (out_b, mut rx_b) = Outbound::channel(ConnectionId::new());
        let mut a = ConnectionState::new(None, out_a);
        let mut b = ConnectionState::new(None, out_b);
        rooms.join(&mut a, &room_name("1"));
        rooms.join(&mut b, &room_name("2"));

        assert_eq!(local.deliver_to_restaurant("1", &Payload::from("one")), 1);
        assert_eq!(rx_a.try_recv().unwrap().as_str(), "one");
        assert!(rx_b.try_recv().is_err());

        assert_eq!(local.deliver_to_restaurant("missing", &Payload::from("x")), 0);
    }
}
