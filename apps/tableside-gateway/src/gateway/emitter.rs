//! The one path from domain services to connected clients.
//!
//! Services receive an [`Emitter`] when they are constructed. Until the
//! gateway binds it at startup every call is a silent no-op, so services work
//! unchanged in contexts where no gateway runs (tests, batch jobs).

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tableside_common::now_millis;

use super::broadcast::{LocalBroadcaster, Payload};
use super::events::{EnvelopeMeta, EventEnvelope, EventName, ServerFrame};
use super::fanout::FanoutBridge;
use crate::error::EmitterError;

struct Bound {
    instance_id: String,
    local: LocalBroadcaster,
    bridge: Option<Arc<FanoutBridge>>,
}

/// Cloneable handle; all clones share one binding.
#[derive(Clone, Default)]
pub struct Emitter {
    bound: Arc<OnceLock<Bound>>,
}

impl Emitter {
    /// An unbound emitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the running gateway. Only the first call succeeds.
    pub fn bind(
        &self,
        instance_id: String,
        local: LocalBroadcaster,
        bridge: Option<Arc<FanoutBridge>>,
    ) -> Result<(), EmitterError> {
        self.bound
            .set(Bound {
                instance_id,
                local,
                bridge,
            })
            .map_err(|_| EmitterError::AlreadyBound)
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get().is_some()
    }

    /// Announce `event` to every client subscribed to the restaurant, on this
    /// instance immediately and on other instances through the bridge.
    ///
    /// Domain code should prefer the typed wrappers in `catalog`.
    pub fn emit(&self, restaurant_id: &str, event: EventName, data: Value) {
        let Some(bound) = self.bound.get() else {
            tracing::trace!(%event, "emitter not bound; dropping event");
            return;
        };
        if restaurant_id.is_empty() {
            tracing::debug!(%event, "dropping event without restaurant id");
            return;
        }

        let frame = ServerFrame::Event(EventEnvelope {
            restaurant_id: restaurant_id.to_string(),
            event,
            data,
            ts: now_millis(),
            meta: EnvelopeMeta {
                instance_id: bound.instance_id.clone(),
            },
        });
        let payload = match frame.to_json() {
            Ok(json) => Payload::from(json),
            Err(e) => {
                tracing::error!(%event, error = %e, "failed to serialize event envelope");
                return;
            }
        };

        let delivered = bound.local.deliver_to_restaurant(restaurant_id, &payload);
        if let Some(bridge) = &bound.bridge {
            bridge.publish(restaurant_id, &payload);
        }

        tracing::debug!(%restaurant_id, %event, delivered, "event emitted");
    }
}
