//! Message types exchanged between the authoritative server and clients.
//!
//! Every payload is wrapped in a [`NetEvent`] before encoding, so a receiver
//! can decode whatever arrives on any subject it is subscribed to. Values are
//! carried as `serde_json::Value` trees.

use game_math::Transform2D;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Replication ─────────────────────────────────────────────────────────────

/// The full current value of one synced cell.
///
/// Server → clients it is an authoritative broadcast; client → server it is
/// an update request the server may accept and re-broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedValueUpdate {
    /// UID of the entity owning the cell.
    pub entity_id: String,
    /// Name of the cell within its entity.
    pub key: String,
    /// Complete current value (never a diff).
    pub value: Value,
}

/// A new transform for a spawnable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformUpdate {
    /// UID of the spawnable.
    pub uid: String,
    /// The replacement transform.
    pub transform: Transform2D,
}

/// A new argument payload for a spawnable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgsUpdate {
    /// UID of the spawnable.
    pub uid: String,
    /// The replacement args object.
    pub args: Value,
}

// ── Custom messages ─────────────────────────────────────────────────────────

/// An application-defined message on a named channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMessage {
    /// Channel name chosen by the application (e.g. `"chat"`).
    pub channel: String,
    /// Arbitrary JSON payload.
    pub payload: Value,
    /// Sending client, filled in for client → server messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

// ── Envelope ────────────────────────────────────────────────────────────────

/// Everything that can arrive from the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetEvent {
    /// A synced value changed (or an update request, on the server).
    SyncedValue(SyncedValueUpdate),
    /// A spawnable moved.
    Transform(TransformUpdate),
    /// A spawnable's args changed.
    Args(ArgsUpdate),
    /// An application message.
    Custom(CustomMessage),
}

impl NetEvent {
    /// Short name used in log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SyncedValue(_) => "synced_value",
            Self::Transform(_) => "transform",
            Self::Args(_) => "args",
            Self::Custom(_) => "custom",
        }
    }
}
