//! The capability the game core needs from a transport.
//!
//! The core never touches sockets. It is handed a [`NetworkHandle`] once and
//! calls these fire-and-forget methods from inside ticks; transport failures
//! are the implementation's to log.

use std::sync::Arc;

use game_math::Transform2D;
use serde_json::Value;

/// Outbound operations available to the authoritative server.
pub trait ServerNetwork: Send + Sync + 'static {
    /// Send the full current value of a synced cell to every client.
    fn broadcast_synced_value(&self, entity_id: &str, key: &str, value: &Value);

    /// Send a spawnable's new transform to every client.
    fn broadcast_transform(&self, uid: &str, transform: &Transform2D);

    /// Send a spawnable's new args to every client.
    fn broadcast_args(&self, uid: &str, args: &Value);

    /// Send an application message to every client.
    fn broadcast_custom_message(&self, channel: &str, payload: &Value);

    /// Send an application message to one client.
    fn send_custom_message(&self, client_id: &str, channel: &str, payload: &Value);
}

/// Outbound operations available to a client.
pub trait ClientNetwork: Send + Sync + 'static {
    /// Ask the server to change a synced cell.
    fn update_synced_value(&self, entity_id: &str, key: &str, value: &Value);

    /// Send an application message to the server.
    fn send_custom_message(&self, channel: &str, payload: &Value);
}

/// Which side of the connection this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkRole {
    /// Authoritative simulation.
    Server,
    /// Mirror of the server's state.
    Client,
}

/// A role-tagged network capability, injected into the game once.
#[derive(Clone)]
pub enum NetworkHandle {
    /// Server-side capability.
    Server(Arc<dyn ServerNetwork>),
    /// Client-side capability.
    Client(Arc<dyn ClientNetwork>),
}

impl NetworkHandle {
    /// Returns the role of this handle.
    #[must_use]
    pub fn role(&self) -> NetworkRole {
        match self {
            Self::Server(_) => NetworkRole::Server,
            Self::Client(_) => NetworkRole::Client,
        }
    }

    /// Route a synced-value change: broadcast on a server, request on a client.
    pub fn push_synced_value(&self, entity_id: &str, key: &str, value: &Value) {
        match self {
            Self::Server(net) => net.broadcast_synced_value(entity_id, key, value),
            Self::Client(net) => net.update_synced_value(entity_id, key, value),
        }
    }
}

impl std::fmt::Debug for NetworkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NetworkHandle").field(&self.role()).finish()
    }
}
