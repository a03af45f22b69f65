//! Message bus abstraction.
//!
//! The relay only needs three things from a bus: subscribe to a pattern,
//! receive the next message, publish bytes to a topic. [`crate::mqtt`]
//! implements this over an MQTT broker; [`memory`] implements it with
//! channels for tests.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BusError;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// A message delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publish/subscribe bus.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Bus: Send + Sync {
    /// Subscribe to a topic pattern. Must survive reconnects.
    async fn subscribe(&self, pattern: &str) -> Result<()>;

    /// Receive the next message from any subscription.
    ///
    /// Returns None once the bus is closed and no more messages will arrive.
    async fn recv(&self) -> Option<InboundMessage>;

    /// Publish `payload` to `topic`.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;
}

/// An in-memory bus for testing.
///
/// Messages are injected through a [`MemoryBusHandle`]; everything the relay
/// publishes is recorded and readable from the handle.
pub mod memory {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex as AsyncMutex};

    #[derive(Default)]
    struct Shared {
        subscriptions: Mutex<Vec<String>>,
        published: Mutex<Vec<InboundMessage>>,
    }

    /// Bus side, given to the relay.
    pub struct MemoryBus {
        shared: Arc<Shared>,
        receiver: AsyncMutex<mpsc::Receiver<InboundMessage>>,
    }

    /// Test side: injects messages and inspects what was published.
    #[derive(Clone)]
    pub struct MemoryBusHandle {
        shared: Arc<Shared>,
        sender: mpsc::Sender<InboundMessage>,
    }

    impl MemoryBus {
        /// Create a bus and its handle. Dropping every handle closes the bus.
        pub fn new() -> (Self, MemoryBusHandle) {
            let (tx, rx) = mpsc::channel(1000);
            let shared = Arc::new(Shared::default());
            (
                Self {
                    shared: Arc::clone(&shared),
                    receiver: AsyncMutex::new(rx),
                },
                MemoryBusHandle { shared, sender: tx },
            )
        }

        /// Everything published so far, readable after the handles are gone.
        pub fn published(&self) -> Vec<InboundMessage> {
            self.shared.published.lock().clone()
        }
    }

    impl MemoryBusHandle {
        /// Deliver a message as if the broker had sent it.
        pub async fn inject(&self, topic: &str, payload: impl Into<Bytes>) -> Result<()> {
            self.sender
                .send(InboundMessage::new(topic, payload))
                .await
                .map_err(|_| BusError::Closed)
        }

        pub fn published(&self) -> Vec<InboundMessage> {
            self.shared.published.lock().clone()
        }

        pub fn subscriptions(&self) -> Vec<String> {
            self.shared.subscriptions.lock().clone()
        }
    }

    #[async_trait]
    impl Bus for MemoryBus {
        async fn subscribe(&self, pattern: &str) -> Result<()> {
            self.shared.subscriptions.lock().push(pattern.to_string());
            Ok(())
        }

        async fn recv(&self) -> Option<InboundMessage> {
            self.receiver.lock().await.recv().await
        }

        async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
            self.shared
                .published
                .lock()
                .push(InboundMessage::new(topic, payload));
            Ok(())
        }
    }
}
