//! Gateway wire-format frames and the closed event taxonomy.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::Identity;

// ---------------------------------------------------------------------------
// Event taxonomy
// ---------------------------------------------------------------------------

/// Every domain event the gateway knows how to announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "order.created")]
    OrderCreated,
    #[serde(rename = "order.updated")]
    OrderUpdated,
    #[serde(rename = "order.status_changed")]
    OrderStatusChanged,
    #[serde(rename = "order.deleted")]
    OrderDeleted,
    #[serde(rename = "table.created")]
    TableCreated,
    #[serde(rename = "table.updated")]
    TableUpdated,
    #[serde(rename = "table.status_changed")]
    TableStatusChanged,
    #[serde(rename = "table.deleted")]
    TableDeleted,
    #[serde(rename = "queue.entry_added")]
    QueueEntryAdded,
    #[serde(rename = "queue.entry_updated")]
    QueueEntryUpdated,
    #[serde(rename = "queue.entry_removed")]
    QueueEntryRemoved,
    #[serde(rename = "queue.updated")]
    QueueUpdated,
}

impl EventName {
    pub const ALL: [EventName; 12] = [
        Self::OrderCreated,
        Self::OrderUpdated,
        Self::OrderStatusChanged,
        Self::OrderDeleted,
        Self::TableCreated,
        Self::TableUpdated,
        Self::TableStatusChanged,
        Self::TableDeleted,
        Self::QueueEntryAdded,
        Self::QueueEntryUpdated,
        Self::QueueEntryRemoved,
        Self::QueueUpdated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderCreated => "order.created",
            Self::OrderUpdated => "order.updated",
            Self::OrderStatusChanged => "order.status_changed",
            Self::OrderDeleted => "order.deleted",
            Self::TableCreated => "table.created",
            Self::TableUpdated => "table.updated",
            Self::TableStatusChanged => "table.status_changed",
            Self::TableDeleted => "table.deleted",
            Self::QueueEntryAdded => "queue.entry_added",
            Self::QueueEntryUpdated => "queue.entry_updated",
            Self::QueueEntryRemoved => "queue.entry_removed",
            Self::QueueUpdated => "queue.updated",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMeta {
    pub instance_id: String,
}

/// A domain event as delivered to clients and to other instances.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub restaurant_id: String,
    pub event: EventName,
    pub data: Value,
    pub ts: i64,
    pub meta: EnvelopeMeta,
}

// ---------------------------------------------------------------------------
// Server → Client frames
// ---------------------------------------------------------------------------

/// A frame sent from the gateway to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Hello {
        ts: i64,
        user: Option<Identity>,
    },
    Pong {
        ts: i64,
    },
    Joined {
        #[serde(rename = "restaurantId")]
        restaurant_id: String,
    },
    Left {
        #[serde(rename = "restaurantId")]
        restaurant_id: String,
    },
    Error {
        message: String,
    },
    Event(EventEnvelope),
}

impl ServerFrame {
    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Error message for a join without the staff capability.
pub const ERR_UNAUTHORIZED: &str = "Unauthorized";
/// Error message for a join without a restaurant id.
pub const ERR_RESTAURANT_REQUIRED: &str = "restaurantId is required";

// ---------------------------------------------------------------------------
// Client → Server frames
// ---------------------------------------------------------------------------

/// A frame received from a client. Anything that does not parse into one of
/// these variants is ignored by the connection loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Ping,
    Join {
        #[serde(rename = "restaurantId", default)]
        restaurant_id: Option<Value>,
    },
    Leave {
        #[serde(rename = "restaurantId", default)]
        restaurant_id: Option<Value>,
    },
}

impl ClientFrame {
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Normalize a client-supplied restaurant id. Strings and numbers are
/// accepted; empty strings, null and anything else count as missing.
pub fn restaurant_id_of(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
