//! Typed announcements for order, table and queue lifecycle events.
//!
//! Each wrapper takes the already-persisted entity and shapes `data` the same
//! way every time: `{order}`, `{table}`, `{entry}` for snapshots, `{orderId}`
//! style for deletions, plus `previousStatus` on status changes.

use serde::Serialize;
use serde_json::{Map, Value};

use super::emitter::Emitter;
use super::events::EventName;

impl Emitter {
    // Orders

    pub fn order_created<T: Serialize>(&self, restaurant_id: &str, order: &T) {
        self.announce(restaurant_id, EventName::OrderCreated, snapshot("order", order));
    }

    pub fn order_updated<T: Serialize>(&self, restaurant_id: &str, order: &T) {
        self.announce(restaurant_id, EventName::OrderUpdated, snapshot("order", order));
    }

    pub fn order_status_changed<T: Serialize>(&self, restaurant_id: &str, order: &T, previous_status: &str) {
        let data = snapshot("order", order).map(|d| with_previous_status(d, previous_status));
        self.announce(restaurant_id, EventName::OrderStatusChanged, data);
    }

    pub fn order_deleted(&self, restaurant_id: &str, order_id: &str) {
        self.announce(restaurant_id, EventName::OrderDeleted, Ok(reference("orderId", order_id)));
    }

    // Tables

    pub fn table_created<T: Serialize>(&self, restaurant_id: &str, table: &T) {
        self.announce(restaurant_id, EventName::TableCreated, snapshot("table", table));
    }

    pub fn table_updated<T: Serialize>(&self, restaurant_id: &str, table: &T) {
        self.announce(restaurant_id, EventName::TableUpdated, snapshot("table", table));
    }

    pub fn table_status_changed<T: Serialize>(&self, restaurant_id: &str, table: &T, previous_status: &str) {
        let data = snapshot("table", table).map(|d| with_previous_status(d, previous_status));
        self.announce(restaurant_id, EventName::TableStatusChanged, data);
    }

    pub fn table_deleted(&self, restaurant_id: &str, table_id: &str) {
        self.announce(restaurant_id, EventName::TableDeleted, Ok(reference("tableId", table_id)));
    }

    // Queue

    pub fn queue_entry_added<T: Serialize>(&self, restaurant_id: &str, entry: &T) {
        self.announce(restaurant_id, EventName::QueueEntryAdded, snapshot("entry", entry));
    }

    pub fn queue_entry_updated<T: Serialize>(&self, restaurant_id: &str, entry: &T) {
        self.announce(restaurant_id, EventName::QueueEntryUpdated, snapshot("entry", entry));
    }

    pub fn queue_entry_removed(&self, restaurant_id: &str, entry_id: &str) {
        self.announce(restaurant_id, EventName::QueueEntryRemoved, Ok(reference("entryId", entry_id)));
    }

    /// Full queue snapshot, for reorderings that touch many entries.
    pub fn queue_updated<T: Serialize>(&self, restaurant_id: &str, entries: &[T]) {
        self.announce(restaurant_id, EventName::QueueUpdated, snapshot("queue", &entries));
    }

    fn announce(&self, restaurant_id: &str, event: EventName, data: serde_json::Result<Value>) {
        match data {
            Ok(data) => self.emit(restaurant_id, event, data),
            Err(e) => tracing::warn!(%event, %restaurant_id, error = %e, "failed to serialize event data"),
        }
    }
}

fn snapshot<T: Serialize + ?Sized>(key: &str, entity: &T) -> serde_json::Result<Value> {
    let mut data = Map::new();
    data.insert(key.to_string(), serde_json::to_value(entity)?);
    Ok(Value::Object(data))
}

fn reference(key: &str, id: &str) -> Value {
    let mut data = Map::new();
    data.insert(key.to_string(), Value::String(id.to_string()));
    Value::Object(data)
}

fn with_previous_status(mut data: Value, previous_status: &str) -> Value {
    if let Value::Object(map) = &mut data {
        map.insert("previousStatus".to_string(), Value::String(previous_status.to_string()));
    }
    data
}
