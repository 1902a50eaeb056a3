//! Custom-message channels the server answers.
//!
//! | channel            | payload                 | reply                                   |
//! |--------------------|-------------------------|-----------------------------------------|
//! | `state-request`    | ignored                 | `full-state` to the sender              |
//! | `spawn-request`    | a spawnable definition  | `spawned` broadcast or `spawn-rejected` |
//! | `destroy-request`  | `{ "uid": "..." }`      | `destroyed` broadcast                   |

use game_core::Game;
use game_net::messages::CustomMessage;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

pub const STATE_REQUEST: &str = "state-request";
pub const FULL_STATE: &str = "full-state";
pub const SPAWN_REQUEST: &str = "spawn-request";
pub const SPAWNED: &str = "spawned";
pub const SPAWN_REJECTED: &str = "spawn-rejected";
pub const DESTROY_REQUEST: &str = "destroy-request";
pub const DESTROYED: &str = "destroyed";

pub fn install(game: &Game) {
    game.on_custom_message(STATE_REQUEST, send_full_state);
    game.on_custom_message(SPAWN_REQUEST, spawn_requested);
    game.on_custom_message(DESTROY_REQUEST, destroy_requested);
    debug!("custom message handlers installed");
}

fn send_full_state(game: &Game, msg: &CustomMessage) {
    let Some(client) = &msg.from else {
        warn!("state request without a sender");
        return;
    };
    let definitions = game.replicate_full_state();
    match serde_json::to_value(&definitions) {
        Ok(payload) => {
            game.send_custom_message(client, FULL_STATE, &payload);
            info!(client = %client, spawnables = definitions.len(), "sent full state");
        }
        Err(e) => warn!(error = %e, "could not serialise full state"),
    }
}

fn spawn_requested(game: &Game, msg: &CustomMessage) {
    let game = game.clone();
    let from = msg.from.clone();
    let definition = msg.payload.clone();
    tokio::spawn(async move {
        match game.spawn(&definition, false).await {
            Ok(Some(spawned)) => match serde_json::to_value(spawned.current_definition()) {
                Ok(payload) => {
                    game.broadcast_custom_message(SPAWNED, &payload);
                }
                Err(e) => warn!(uid = spawned.uid(), error = %e, "could not serialise spawn"),
            },
            Ok(None) => reject(&game, from.as_deref(), "unknown entity type"),
            Err(e) => reject(&game, from.as_deref(), &e.to_string()),
        }
    });
}

fn reject(game: &Game, client: Option<&str>, reason: &str) {
    debug!(client = ?client, reason, "spawn request rejected");
    if let Some(client) = client {
        game.send_custom_message(client, SPAWN_REJECTED, &json!({ "reason": reason }));
    }
}

fn destroy_requested(game: &Game, msg: &CustomMessage) {
    let Some(uid) = msg.payload.get("uid").and_then(Value::as_str) else {
        warn!(payload = %msg.payload, "destroy request without a uid");
        return;
    };
    let game = game.clone();
    let uid = uid.to_string();
    tokio::spawn(async move {
        match game.destroy_uid(&uid).await {
            Ok(true) => {
                game.broadcast_custom_message(DESTROYED, &json!({ "uid": uid }));
            }
            Ok(false) => debug!(uid = %uid, "destroy request for unknown uid"),
            Err(e) => warn!(uid = %uid, error = %e, "destroy request failed"),
        }
    });
}
