//! NATS subject hierarchy.
//!
//! All game subjects are prefixed with `game.` to namespace within a shared
//! NATS cluster.

/// Root prefix for all game NATS subjects.
pub const PREFIX: &str = "game";

// ── Synced values ───────────────────────────────────────────────────────────

/// Authoritative synced-value changes. Server → clients.
pub const SYNCED_BROADCAST: &str = "game.synced.broadcast";

/// Synced-value update requests. Clients → server.
pub const SYNCED_UPDATE: &str = "game.synced.update";

// ── Spawnable state ─────────────────────────────────────────────────────────

/// Transform changes of spawnables. Server → clients.
pub const ENTITY_TRANSFORM: &str = "game.entity.transform";

/// Args changes of spawnables. Server → clients.
pub const ENTITY_ARGS: &str = "game.entity.args";

// ── Custom messages ─────────────────────────────────────────────────────────

/// Custom messages for every client. Server → clients.
pub const CUSTOM_BROADCAST: &str = "game.custom.broadcast";

/// Custom messages addressed to the server. Clients → server.
pub const CUSTOM_SERVER: &str = "game.custom.server";

// ── Dynamic subject builders ────────────────────────────────────────────────

/// Build the subject for custom messages addressed to a single client.
///
/// `game.client.<client_id>.custom`
#[must_use]
pub fn client_custom(client_id: &str) -> String {
    format!("game.client.{client_id}.custom")
}
