//! Client frame dispatch: PING, JOIN and LEAVE.

use std::collections::HashSet;

use tableside_common::now_millis;

use super::events::{restaurant_id_of, ClientFrame, ServerFrame, ERR_RESTAURANT_REQUIRED, ERR_UNAUTHORIZED};
use super::registry::{room_name, RoomRegistry};
use super::session::ConnectionState;

/// Apply one parsed client frame to the connection. Returns the reply to
/// send back, if any. Refusals never mutate room membership.
pub fn handle_frame(
    rooms: &RoomRegistry,
    staff_roles: &HashSet<String>,
    conn: &mut ConnectionState,
    frame: ClientFrame,
) -> Option<ServerFrame> {
    match frame {
        ClientFrame::Ping => Some(ServerFrame::Pong { ts: now_millis() }),

        ClientFrame::Join { restaurant_id } => {
            let Some(restaurant_id) = restaurant_id_of(restaurant_id.as_ref()) else {
                return Some(ServerFrame::error(ERR_RESTAURANT_REQUIRED));
            };

            let is_staff = conn
                .identity()
                .is_some_and(|identity| identity.is_staff(staff_roles));
            if !is_staff {
                tracing::debug!(connection_id = %conn.id(), %restaurant_id, "join refused: not staff");
                return Some(ServerFrame::error(ERR_UNAUTHORIZED));
            }

            if rooms.join(conn, &room_name(&restaurant_id)) {
                tracing::debug!(connection_id = %conn.id(), %restaurant_id, "joined restaurant room");
            }
            Some(ServerFrame::Joined { restaurant_id })
        }

        ClientFrame::Leave { restaurant_id } => {
            let restaurant_id = restaurant_id_of(restaurant_id.as_ref())?;
            rooms.leave(conn, &room_name(&restaurant_id));
            Some(ServerFrame::Left { restaurant_id })
        }
    }
}
