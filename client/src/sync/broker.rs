//! Connection plumbing shared by the job and client sync services.
//!
//! The connection lifecycle is an explicit state machine
//! (disconnected/connecting/connected/errored) published on a watch
//! channel. Reconnection is driven by polling the rumqttc event loop again
//! after the fixed reconnect pause; there is no backoff.

use crate::config::Config;
use crate::errors::ServiceError;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, NetworkOptions, Packet, QoS, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const TOPIC_ROOT: &str = "TimeKeeper/wfm";

/// Connection lifecycle of a sync service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub url: String,
    pub keep_alive: Duration,
    pub reconnect: Duration,
    pub connect_timeout: Duration,
}

impl BrokerSettings {
    pub fn from_config(config: &Config) -> Self {
        BrokerSettings {
            url: config.broker_url.clone(),
            keep_alive: Duration::from_secs(config.broker_keep_alive_secs),
            reconnect: Duration::from_secs(config.broker_reconnect_secs),
            connect_timeout: Duration::from_secs(config.broker_connect_timeout_secs),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        BrokerSettings {
            url: "ws://localhost:9001".to_string(),
            keep_alive: Duration::from_secs(60),
            reconnect: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Message subtype encoded in the last topic segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Details,
    Status,
}

/// Splits `TimeKeeper/wfm/<entity>/<id>/<kind>` into the id segment and
/// the message kind. Topics with an unknown kind suffix yield `None`.
pub fn parse_topic(topic: &str) -> Option<(&str, MessageKind)> {
    let segments: Vec<&str> = topic.split('/').collect();
    let id = *segments.get(3)?;
    let kind = match *segments.get(4)? {
        "details" => MessageKind::Details,
        "status" => MessageKind::Status,
        _ => return None,
    };
    Some((id, kind))
}

/// Inbound message callback implemented by each sync service.
#[async_trait]
pub(crate) trait MessageHandler: Send + Sync + 'static {
    async fn on_message(&self, topic: &str, payload: &[u8]);
}

fn client_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

/// Builds the MQTT client and event loop for one service connection.
pub(crate) fn open(settings: &BrokerSettings, id_prefix: &str) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(client_id(id_prefix), settings.url.clone(), 0);
    if settings.url.starts_with("ws://") {
        options.set_transport(Transport::Ws);
    }
    options.set_keep_alive(settings.keep_alive);
    options.set_clean_session(true);

    let (client, mut eventloop) = AsyncClient::new(options, 64);

    let mut network_options = NetworkOptions::new();
    network_options.set_connection_timeout(settings.connect_timeout.as_secs());
    eventloop.set_network_options(network_options);

    (client, eventloop)
}

/// Drives one connection: subscribes on ConnAck, hands publishes to the
/// handler, and on errors pauses for the reconnect interval before polling
/// again (rumqttc re-establishes the connection on the next poll).
pub(crate) fn spawn_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscription: String,
    handler: Arc<dyn MessageHandler>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    reconnect: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("connected to broker, subscribing to {}", subscription);
                    state_tx.send_replace(ConnectionState::Connected);
                    if let Err(e) = client.subscribe(&subscription, QoS::AtLeastOnce).await {
                        tracing::error!("failed to subscribe to {}: {}", subscription, e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    handler.on_message(&publish.topic, &publish.payload).await;
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    tracing::info!("broker closed the connection");
                    state_tx.send_replace(ConnectionState::Disconnected);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("broker connection error: {}", e);
                    state_tx.send_replace(ConnectionState::Errored);
                    tokio::time::sleep(reconnect).await;
                    state_tx.send_replace(ConnectionState::Connecting);
                }
            }
        }
    })
}

pub(crate) fn publish_error(e: rumqttc::ClientError) -> ServiceError {
    ServiceError::broker(e.to_string())
}
