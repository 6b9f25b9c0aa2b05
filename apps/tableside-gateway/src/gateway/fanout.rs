//! Cross-instance fanout over a shared pub/sub bus.
//!
//! Every locally emitted event is also published on its restaurant's
//! channel; every instance listens on the wildcard pattern and re-delivers
//! what other instances published. Messages carrying our own instance id are
//! dropped, since they were already delivered locally.
//!
//! The bridge is best-effort. It never reports failure to the emitter. If its
//! subscription is lost or a publish fails, it logs once and disables itself
//! until the process restarts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::broadcast::{LocalBroadcaster, Payload};
use super::bus::{BusStream, PubSubBus};
use super::events::restaurant_id_of;
use crate::error::BridgeError;

/// Per-restaurant channel namespace on the bus.
pub const CHANNEL_PREFIX: &str = "rt:restaurant:";
/// Pattern covering every restaurant channel.
pub const CHANNEL_PATTERN: &str = "rt:restaurant:*";

pub fn channel_for(restaurant_id: &str) -> String {
    format!("{CHANNEL_PREFIX}{restaurant_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Active,
    Disabled,
}

impl BridgeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

pub struct FanoutBridge {
    active: Arc<AtomicBool>,
    outgoing: mpsc::UnboundedSender<(String, Payload)>,
}

impl FanoutBridge {
    /// Subscribe to the restaurant pattern and spawn the subscriber and
    /// publisher tasks. Fails only if the initial subscription fails.
    pub async fn start(
        bus: Arc<dyn PubSubBus>,
        local: LocalBroadcaster,
        instance_id: &str,
    ) -> Result<Self, BridgeError> {
        let incoming = bus.psubscribe(CHANNEL_PATTERN).await?;

        let active = Arc::new(AtomicBool::new(true));
        let (outgoing, queue) = mpsc::unbounded_channel();

        tokio::spawn(run_subscriber(incoming, local, instance_id.to_string(), active.clone()));
        tokio::spawn(run_publisher(bus, queue, active.clone()));

        tracing::info!(pattern = CHANNEL_PATTERN, %instance_id, "fanout bridge subscribed");

        Ok(Self { active, outgoing })
    }

    pub fn state(&self) -> BridgeState {
        if self.active.load(Ordering::Acquire) {
            BridgeState::Active
        } else {
            BridgeState::Disabled
        }
    }

    /// Queue an already-serialized envelope for the restaurant's channel.
    /// Publishes go out in call order and never block the caller.
    pub fn publish(&self, restaurant_id: &str, payload: &Payload) {
        if self.state() == BridgeState::Disabled {
            return;
        }
        let _ = self.outgoing.send((channel_for(restaurant_id), payload.clone()));
    }
}

/// Start the bridge, or log why not and return `None` so the gateway keeps
/// running single-instance.
pub async fn start_or_degrade(
    bus: Arc<dyn PubSubBus>,
    local: LocalBroadcaster,
    instance_id: &str,
) -> Option<Arc<FanoutBridge>> {
    match FanoutBridge::start(bus, local, instance_id).await {
        Ok(bridge) => Some(Arc::new(bridge)),
        Err(e) => {
            tracing::warn!(error = %e, "fanout bridge failed to start; running single-instance");
            None
        }
    }
}

async fn run_subscriber(
    mut incoming: BusStream,
    local: LocalBroadcaster,
    instance_id: String,
    active: Arc<AtomicBool>,
) {
    while let Some(msg) = incoming.next().await {
        if !active.load(Ordering::Acquire) {
            return;
        }
        let Some(restaurant_id) = accept_remote(&msg.payload, &instance_id) else {
            tracing::trace!(channel = %msg.channel, "discarding bus message");
            continue;
        };
        let delivered = local.deliver_to_restaurant(&restaurant_id, &Payload::from(msg.payload));
        tracing::debug!(%restaurant_id, delivered, "relayed remote event");
    }

    if active.swap(false, Ordering::AcqRel) {
        tracing::warn!("fanout subscription ended; running single-instance until restart");
    }
}

async fn run_publisher(
    bus: Arc<dyn PubSubBus>,
    mut queue: mpsc::UnboundedReceiver<(String, Payload)>,
    active: Arc<AtomicBool>,
) {
    while let Some((channel, payload)) = queue.recv().await {
        if !active.load(Ordering::Acquire) {
            break;
        }
        if let Err(e) = bus.publish(&channel, payload.as_str()).await {
            if active.swap(false, Ordering::AcqRel) {
                tracing::warn!(%channel, error = %e, "fanout publish failed; running single-instance until restart");
            }
            break;
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "restaurantId")]
    restaurant_id: Option<Value>,
    meta: Option<RemoteMeta>,
}

#[derive(Debug, Deserialize)]
struct RemoteMeta {
    #[serde(rename = "instanceId")]
    instance_id: Option<String>,
}

/// Decide whether a bus message should be re-delivered locally. Returns the
/// restaurant id to deliver to, or `None` for garbage, non-event frames,
/// frames without a restaurant, and our own echoes.
pub fn accept_remote(payload: &str, own_instance_id: &str) -> Option<String> {
    let envelope: RemoteEnvelope = serde_json::from_str(payload).ok()?;
    if envelope.kind.as_deref() != Some("event") {
        return None;
    }
    let restaurant_id = restaurant_id_of(envelope.restaurant_id.as_ref())?;
    let origin = envelope.meta.and_then(|m| m.instance_id);
    if origin.as_deref() == Some(own_instance_id) {
        return None;
    }
    Some(restaurant_id)
}
