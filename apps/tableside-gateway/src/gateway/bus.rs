use std::future;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::broadcast;

use crate::error::BridgeError;

/// One message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}

pub type BusStream = BoxStream<'static, BusMessage>;

/// Abstraction over the publish/subscribe bus shared by gateway instances.
///
/// Backed by Redis in production and an in-process channel in tests.
#[async_trait]
pub trait PubSubBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BridgeError>;

    /// Subscribe to every channel matching a glob pattern. The stream ends
    /// when the subscription is lost.
    async fn psubscribe(&self, pattern: &str) -> Result<BusStream, BridgeError>;
}

// ---------------------------------------------------------------------------
// Redis implementation
// ---------------------------------------------------------------------------

/// Publishes over a reconnecting connection manager; each subscription gets
/// its own dedicated pub/sub connection.
pub struct RedisBus {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisBus {
    pub async fn connect(redis_url: &str) -> Result<Self, BridgeError> {
        let client = redis::Client::open(redis_url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl PubSubBus for RedisBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BridgeError> {
        let mut conn = self.publisher.clone();
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<BusStream, BridgeError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(pattern).await?;

        let messages = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(payload) => Some(BusMessage {
                    channel: msg.get_channel_name().to_string(),
                    payload,
                }),
                Err(e) => {
                    tracing::debug!(?e, "dropping non-text bus message");
                    None
                }
            }
        });
        Ok(messages.boxed())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (for tests / single-host simulation)
// ---------------------------------------------------------------------------

/// Capacity of the in-memory bus. Lagging subscribers skip messages, the
/// same way a slow Redis subscriber would be cut off.
const MEMORY_BUS_CAPACITY: usize = 4096;

pub struct MemoryBus {
    sender: RwLock<Option<broadcast::Sender<BusMessage>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(MEMORY_BUS_CAPACITY);
        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    /// Shut the bus down. Open subscriptions end; later calls fail.
    pub fn close(&self) {
        self.sender.write().take();
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PubSubBus for MemoryBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BridgeError> {
        let guard = self.sender.read();
        let sender = guard
            .as_ref()
            .ok_or_else(|| BridgeError::Unavailable("memory bus closed".into()))?;
        // No subscribers is not an error, as with Redis PUBLISH.
        let _ = sender.send(BusMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<BusStream, BridgeError> {
        let receiver = self
            .sender
            .read()
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or_else(|| BridgeError::Unavailable("memory bus closed".into()))?;

        let pattern = pattern.to_string();
        let messages = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(msg) => return Some((msg, receiver)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "memory bus subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |msg| future::ready(channel_matches(&pattern, &msg.channel)));
        Ok(messages.boxed())
    }
}

/// Glob match supporting exact names and a single trailing `*`.
fn channel_matches(pattern: &str, channel: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => channel.starts_with(prefix),
        None => pattern == channel,
    }
}
