//! MQTT implementation of [`Bus`].
//!
//! A background task drives the rumqttc event loop. It forwards publishes
//! into a channel read by [`Bus::recv`], and re-issues every subscription on
//! each successful ConnAck so that a broker restart does not silently stop
//! the relay.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::bus::{Bus, InboundMessage, Result};
use crate::config::BrokerConfig;

/// Pause between reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Capacity of the client request queue and the inbound channel.
const QUEUE_CAPACITY: usize = 1000;

/// rumqttc refuses keep-alives shorter than this.
const MIN_KEEP_ALIVE_SECS: u64 = 5;

#[derive(Default)]
struct Subscriptions {
    patterns: Vec<String>,
    connected: bool,
}

/// Bus backed by an MQTT broker.
pub struct MqttBus {
    client: AsyncClient,
    subscriptions: Arc<Mutex<Subscriptions>>,
    inbound: AsyncMutex<mpsc::Receiver<InboundMessage>>,
    driver: JoinHandle<()>,
}

impl MqttBus {
    /// Start connecting to the broker. Returns immediately; the connection
    /// is established (and re-established) in the background.
    pub fn connect(config: &BrokerConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(
            config.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS),
        ));
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.as_deref().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, QUEUE_CAPACITY);
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let subscriptions = Arc::new(Mutex::new(Subscriptions::default()));

        tracing::info!(host = %config.host, port = config.port, "connecting to MQTT broker");
        let driver = tokio::spawn(drive(
            eventloop,
            client.clone(),
            Arc::clone(&subscriptions),
            tx,
            format!("{}:{}", config.host, config.port),
        ));

        Self {
            client,
            subscriptions,
            inbound: AsyncMutex::new(rx),
            driver,
        }
    }

    /// Send a clean disconnect and stop the background task.
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!(error = %e, "disconnect request failed");
        }
        self.driver.abort();
        tracing::info!("disconnected from MQTT broker");
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscriptions: Arc<Mutex<Subscriptions>>,
    inbound: mpsc::Sender<InboundMessage>,
    broker: String,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code != ConnectReturnCode::Success {
                    tracing::error!(broker = %broker, code = ?ack.code, "failed to connect");
                    continue;
                }
                tracing::info!(broker = %broker, "connected to MQTT broker");
                let mut subs = subscriptions.lock();
                for pattern in &subs.patterns {
                    match client.try_subscribe(pattern.as_str(), QoS::AtMostOnce) {
                        Ok(()) => tracing::info!(topic = %pattern, "subscribed to input topic"),
                        Err(e) => tracing::error!(topic = %pattern, error = %e, "subscribe failed"),
                    }
                }
                subs.connected = true;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload,
                };
                if inbound.send(message).await.is_err() {
                    tracing::debug!("inbound receiver dropped, stopping event loop");
                    return;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                subscriptions.lock().connected = false;
                tracing::warn!(broker = %broker, "broker sent disconnect");
            }
            Ok(_) => {}
            Err(e) => {
                subscriptions.lock().connected = false;
                tracing::warn!(broker = %broker, error = %e, "unexpected disconnect, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl Bus for MqttBus {
    async fn subscribe(&self, pattern: &str) -> Result<()> {
        let mut subs = self.subscriptions.lock();
        subs.patterns.push(pattern.to_string());
        // Otherwise the next ConnAck subscribes.
        if subs.connected {
            self.client.try_subscribe(pattern, QoS::AtMostOnce)?;
            tracing::info!(topic = %pattern, "subscribed to input topic");
        }
        Ok(())
    }

    async fn recv(&self) -> Option<InboundMessage> {
        self.inbound.lock().await.recv().await
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        self.client
            .publish_bytes(topic, QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }
}
