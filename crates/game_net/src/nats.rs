//! NATS-backed implementations of [`ServerNetwork`] and [`ClientNetwork`].
//!
//! Outbound calls are non-blocking: they queue a [`NetEvent`] on an unbounded
//! channel drained by a background publisher task, so ticks never wait on the
//! network. Inbound messages from every subscribed subject are decoded and
//! merged into one bounded receiver that the caller feeds to the game.

use futures::StreamExt;
use game_math::Transform2D;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{decode, encode};
use crate::connection::NatsConnection;
use crate::error::NetError;
use crate::messages::{ArgsUpdate, CustomMessage, NetEvent, SyncedValueUpdate, TransformUpdate};
use crate::network::{ClientNetwork, ServerNetwork};
use crate::subjects;

/// Capacity of the inbound event channel.
const INBOUND_CAPACITY: usize = 1024;

struct Outgoing {
    subject: String,
    event: NetEvent,
}

/// Queues events for the background publisher task.
#[derive(Debug, Clone)]
struct Publisher {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Publisher {
    fn spawn(conn: NatsConnection) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Outgoing>();
        tokio::spawn(async move {
            while let Some(out) = rx.recv().await {
                let kind = out.event.kind();
                let bytes = match encode(&out.event) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(kind, error = %e, "failed to encode outbound event");
                        continue;
                    }
                };
                if let Err(e) = conn.publish_bytes(out.subject, bytes).await {
                    warn!(kind, error = %e, "failed to publish outbound event");
                }
            }
            debug!("publisher stopped");
        });
        Self { tx }
    }

    fn send(&self, subject: impl Into<String>, event: NetEvent) {
        let kind = event.kind();
        let out = Outgoing {
            subject: subject.into(),
            event,
        };
        if self.tx.send(out).is_err() {
            warn!(kind, "{}", NetError::ChannelClosed);
        }
    }
}

/// Subscribe to `subject_list` and forward every decoded event into a channel.
async fn spawn_inbound(
    conn: &NatsConnection,
    subject_list: &[String],
) -> Result<mpsc::Receiver<NetEvent>, NetError> {
    let mut streams = Vec::with_capacity(subject_list.len());
    for subject in subject_list {
        streams.push(conn.subscribe(subject).await?.boxed());
        debug!(subject = %subject, "subscribed");
    }

    let mut merged = futures::stream::select_all(streams);
    let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
    tokio::spawn(async move {
        while let Some(msg) = merged.next().await {
            match decode::<NetEvent>(msg.payload.as_ref()) {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(subject = %msg.subject, error = %e, "dropping undecodable message"),
            }
        }
        debug!("inbound pump stopped");
    });
    Ok(rx)
}

/// Server side of the NATS transport.
#[derive(Debug, Clone)]
pub struct NatsServerNetwork {
    publisher: Publisher,
}

impl NatsServerNetwork {
    /// Start publishing and listening for client requests.
    ///
    /// Returns the network handle and the stream of inbound client events
    /// (synced-value update requests and custom messages).
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if a subscription fails.
    pub async fn start(conn: NatsConnection) -> Result<(Self, mpsc::Receiver<NetEvent>), NetError> {
        let inbound = spawn_inbound(
            &conn,
            &[
                subjects::SYNCED_UPDATE.to_string(),
                subjects::CUSTOM_SERVER.to_string(),
            ],
        )
        .await?;
        info!("server network started");
        Ok((
            Self {
                publisher: Publisher::spawn(conn),
            },
            inbound,
        ))
    }
}

impl ServerNetwork for NatsServerNetwork {
    fn broadcast_synced_value(&self, entity_id: &str, key: &str, value: &Value) {
        self.publisher.send(
            subjects::SYNCED_BROADCAST,
            NetEvent::SyncedValue(SyncedValueUpdate {
                entity_id: entity_id.to_string(),
                key: key.to_string(),
                value: value.clone(),
            }),
        );
    }

    fn broadcast_transform(&self, uid: &str, transform: &Transform2D) {
        self.publisher.send(
            subjects::ENTITY_TRANSFORM,
            NetEvent::Transform(TransformUpdate {
                uid: uid.to_string(),
                transform: *transform,
            }),
        );
    }

    fn broadcast_args(&self, uid: &str, args: &Value) {
        self.publisher.send(
            subjects::ENTITY_ARGS,
            NetEvent::Args(ArgsUpdate {
                uid: uid.to_string(),
                args: args.clone(),
            }),
        );
    }

    fn broadcast_custom_message(&self, channel: &str, payload: &Value) {
        self.publisher.send(
            subjects::CUSTOM_BROADCAST,
            NetEvent::Custom(CustomMessage {
                channel: channel.to_string(),
                payload: payload.clone(),
                from: None,
            }),
        );
    }

    fn send_custom_message(&self, client_id: &str, channel: &str, payload: &Value) {
        self.publisher.send(
            subjects::client_custom(client_id),
            NetEvent::Custom(CustomMessage {
                channel: channel.to_string(),
                payload: payload.clone(),
                from: None,
            }),
        );
    }
}

/// Client side of the NATS transport.
#[derive(Debug, Clone)]
pub struct NatsClientNetwork {
    client_id: String,
    publisher: Publisher,
}

impl NatsClientNetwork {
    /// Start publishing and listening for server broadcasts under a fresh
    /// client id.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if a subscription fails.
    pub async fn start(conn: NatsConnection) -> Result<(Self, mpsc::Receiver<NetEvent>), NetError> {
        let client_id = Uuid::new_v4().to_string();
        let inbound = spawn_inbound(
            &conn,
            &[
                subjects::SYNCED_BROADCAST.to_string(),
                subjects::ENTITY_TRANSFORM.to_string(),
                subjects::ENTITY_ARGS.to_string(),
                subjects::CUSTOM_BROADCAST.to_string(),
                subjects::client_custom(&client_id),
            ],
        )
        .await?;
        info!(client_id = %client_id, "client network started");
        Ok((
            Self {
                client_id,
                publisher: Publisher::spawn(conn),
            },
            inbound,
        ))
    }

    /// The id other peers use to address this client.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl ClientNetwork for NatsClientNetwork {
    fn update_synced_value(&self, entity_id: &str, key: &str, value: &Value) {
        self.publisher.send(
            subjects::SYNCED_UPDATE,
            NetEvent::SyncedValue(SyncedValueUpdate {
                entity_id: entity_id.to_string(),
                key: key.to_string(),
                value: value.clone(),
            }),
        );
    }

    fn send_custom_message(&self, channel: &str, payload: &Value) {
        self.publisher.send(
            subjects::CUSTOM_SERVER,
            NetEvent::Custom(CustomMessage {
                channel: channel.to_string(),
                payload: payload.clone(),
                from: Some(self.client_id.clone()),
            }),
        );
    }
}
