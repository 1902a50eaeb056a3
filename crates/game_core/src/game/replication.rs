//! Replication: synced-value routing, inbound updates, spawnable state and
//! custom messages.
//!
//! The network handle is injected once with [`Game::init_network`]. Until
//! then synced-value changes go nowhere. On a server every effective change
//! is broadcast; on a client it becomes an update request the server may
//! accept and re-broadcast.

use std::sync::{Arc, OnceLock, PoisonError};

use game_math::Transform2D;
use game_net::messages::{ArgsUpdate, CustomMessage, SyncedValueUpdate, TransformUpdate};
use game_net::{NetEvent, NetworkHandle, NetworkRole};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::Game;
use crate::error::{GameError, ValidationError};
use crate::spawnable::{SpawnableDefinition, SpawnedEntity};
use crate::synced::{ErasedCell, SyncHook, SyncedData, SyncedValue};

/// Handles custom messages on one channel.
pub type CustomHandler = Arc<dyn Fn(&Game, &CustomMessage) + Send + Sync>;

/// Routes synced-value pushes to whatever network the game has.
struct NetworkSyncHook {
    network: Arc<OnceLock<NetworkHandle>>,
}

impl SyncHook for NetworkSyncHook {
    fn push(&self, entity_id: &str, key: &str, value: &Value) {
        match self.network.get() {
            Some(network) => network.push_synced_value(entity_id, key, value),
            None => trace!(entity_id, key, "no network, synced value change not sent"),
        }
    }
}

impl Game {
    /// Inject the network capability. May only be called once.
    ///
    /// # Errors
    ///
    /// [`GameError::NetworkAlreadyInitialized`] on a second call.
    pub fn init_network(&self, network: NetworkHandle) -> Result<(), GameError> {
        let role = network.role();
        self.inner
            .network
            .set(network)
            .map_err(|_| GameError::NetworkAlreadyInitialized)?;
        info!(?role, "network initialized");
        Ok(())
    }

    #[must_use]
    pub fn network(&self) -> Option<&NetworkHandle> {
        self.inner.network.get()
    }

    #[must_use]
    pub fn role(&self) -> Option<NetworkRole> {
        self.network().map(NetworkHandle::role)
    }

    fn is_server(&self) -> bool {
        self.role() == Some(NetworkRole::Server)
    }

    /// Create the synced value `(entity_id, key)` and make it reachable by
    /// inbound updates.
    ///
    /// # Errors
    ///
    /// [`GameError::DuplicateSyncedValue`] if a live cell already uses the
    /// same key.
    pub fn synced_value<T: SyncedData>(
        &self,
        entity_id: impl Into<String>,
        key: impl Into<String>,
        initial: T,
    ) -> Result<SyncedValue<T>, GameError> {
        let (entity_id, key) = (entity_id.into(), key.into());
        let slot = (entity_id.clone(), key.clone());
        if self.live_cell(&slot).is_some() {
            return Err(GameError::DuplicateSyncedValue { entity_id, key });
        }
        let hook = Arc::new(NetworkSyncHook {
            network: Arc::clone(&self.inner.network),
        });
        let cell = SyncedValue::new(entity_id, key, initial, hook);
        self.inner.synced.insert(slot, cell.erased());
        Ok(cell)
    }

    /// The live cell for `slot`, pruning it if it has gone away.
    fn live_cell(&self, slot: &(String, String)) -> Option<Arc<dyn ErasedCell>> {
        let cell = self.inner.synced.get(slot).and_then(|weak| weak.upgrade());
        match cell {
            Some(cell) if !cell.is_destroyed() => Some(cell),
            _ => {
                self.inner.synced.remove(slot);
                None
            }
        }
    }

    /// Apply one event received from the network.
    ///
    /// Updates for unknown entities or cells are logged and ignored.
    ///
    /// # Errors
    ///
    /// [`GameError::Synced`] if a synced-value payload does not fit the
    /// cell's type. [`GameError::Validation`] if an args update fails the
    /// spawnable type's schema; the entity keeps its previous args.
    pub fn apply_inbound(&self, event: NetEvent) -> Result<(), GameError> {
        trace!(kind = event.kind(), "inbound event");
        match event {
            NetEvent::SyncedValue(SyncedValueUpdate {
                entity_id,
                key,
                value,
            }) => {
                let slot = (entity_id, key);
                let Some(cell) = self.live_cell(&slot) else {
                    debug!(entity_id = %slot.0, key = %slot.1, "update for unknown synced value");
                    return Ok(());
                };
                if self.is_server() {
                    // Client request: change-detect and re-broadcast.
                    cell.set_json(value)?;
                } else {
                    cell.apply_remote_json(value)?;
                }
            }
            NetEvent::Transform(TransformUpdate { uid, transform }) => {
                if self.is_server() {
                    debug!(uid = %uid, "ignoring inbound transform on server");
                } else if let Some(spawned) = self.lookup(&uid) {
                    self.apply_transform(&spawned, transform);
                } else {
                    debug!(uid = %uid, "transform for unknown spawnable");
                }
            }
            NetEvent::Args(ArgsUpdate { uid, args }) => {
                if self.is_server() {
                    debug!(uid = %uid, "ignoring inbound args on server");
                } else if let Some(spawned) = self.lookup(&uid) {
                    self.check_args(&spawned, &args)?;
                    self.apply_args(&spawned, args);
                } else {
                    debug!(uid = %uid, "args for unknown spawnable");
                }
            }
            NetEvent::Custom(message) => {
                let handler = self
                    .inner
                    .custom_handlers
                    .get(&message.channel)
                    .map(|h| Arc::clone(h.value()));
                match handler {
                    Some(handler) => handler(self, &message),
                    None => debug!(channel = %message.channel, "no handler for custom message"),
                }
            }
        }
        Ok(())
    }

    /// Replace a spawnable's transform. On a server the change is broadcast.
    /// Returns `false` if `uid` is unknown.
    pub fn set_transform(&self, uid: &str, transform: Transform2D) -> bool {
        let Some(spawned) = self.lookup(uid) else {
            return false;
        };
        self.apply_transform(&spawned, transform);
        if let Some(NetworkHandle::Server(net)) = self.network() {
            net.broadcast_transform(uid, &transform);
        }
        true
    }

    /// Replace a spawnable's args. On a server the change is broadcast.
    /// Returns `false` if `uid` is unknown.
    ///
    /// # Errors
    ///
    /// [`GameError::Validation`] if `args` fails the type's schema. Nothing
    /// is stored or sent in that case.
    pub fn set_args(&self, uid: &str, args: Value) -> Result<bool, GameError> {
        let Some(spawned) = self.lookup(uid) else {
            return Ok(false);
        };
        self.check_args(&spawned, &args)?;
        if let Some(NetworkHandle::Server(net)) = self.network() {
            net.broadcast_args(uid, &args);
        }
        self.apply_args(&spawned, args);
        Ok(true)
    }

    fn check_args(&self, spawned: &SpawnedEntity, args: &Value) -> Result<(), ValidationError> {
        let spawnables = self
            .inner
            .spawnables
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match spawnables.get(&spawned.definition().entity) {
            Some(spawn_fn) => spawn_fn.validate_args(args),
            None => Ok(()),
        }
    }

    fn apply_transform(&self, spawned: &SpawnedEntity, transform: Transform2D) {
        spawned.replace_transform(transform);
        if let Some(hooks) = spawned.entity().spawnable()
            && let Err(e) = hooks.on_transform(self, spawned)
        {
            warn!(uid = spawned.uid(), error = %e, "transform hook failed");
        }
    }

    fn apply_args(&self, spawned: &SpawnedEntity, args: Value) {
        spawned.replace_args(args);
        if let Some(hooks) = spawned.entity().spawnable()
            && let Err(e) = hooks.on_args(self, spawned)
        {
            warn!(uid = spawned.uid(), error = %e, "args hook failed");
        }
    }

    /// Handle custom messages on `channel`, replacing any previous handler.
    pub fn on_custom_message(
        &self,
        channel: impl Into<String>,
        handler: impl Fn(&Game, &CustomMessage) + Send + Sync + 'static,
    ) {
        self.inner
            .custom_handlers
            .insert(channel.into(), Arc::new(handler));
    }

    /// Server: send a custom message to every client. Returns `false` if
    /// this game is not a server.
    pub fn broadcast_custom_message(&self, channel: &str, payload: &Value) -> bool {
        match self.network() {
            Some(NetworkHandle::Server(net)) => {
                net.broadcast_custom_message(channel, payload);
                true
            }
            _ => {
                warn!(channel, "broadcast_custom_message needs a server network");
                false
            }
        }
    }

    /// Server: send a custom message to one client. Returns `false` if this
    /// game is not a server.
    pub fn send_custom_message(&self, client_id: &str, channel: &str, payload: &Value) -> bool {
        match self.network() {
            Some(NetworkHandle::Server(net)) => {
                net.send_custom_message(client_id, channel, payload);
                true
            }
            _ => {
                warn!(channel, "send_custom_message needs a server network");
                false
            }
        }
    }

    /// Client: send a custom message to the server. Returns `false` if this
    /// game is not a client.
    pub fn send_to_server(&self, channel: &str, payload: &Value) -> bool {
        match self.network() {
            Some(NetworkHandle::Client(net)) => {
                net.send_custom_message(channel, payload);
                true
            }
            _ => {
                warn!(channel, "send_to_server needs a client network");
                false
            }
        }
    }

    /// Resend every live synced value and return the current definitions
    /// of all non-preview spawnables, for a client that just joined.
    pub fn replicate_full_state(&self) -> Vec<SpawnableDefinition> {
        let slots: Vec<(String, String)> = self
            .inner
            .synced
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let mut resent = 0usize;
        for slot in slots {
            if let Some(cell) = self.live_cell(&slot) {
                match cell.sync() {
                    Ok(()) => resent += 1,
                    Err(e) => warn!(entity_id = %slot.0, key = %slot.1, error = %e, "resync failed"),
                }
            }
        }

        let definitions: Vec<_> = self
            .spawned()
            .into_iter()
            .filter(|s| !s.is_preview())
            .map(|s| s.current_definition())
            .collect();
        info!(
            synced = resent,
            spawnables = definitions.len(),
            "replicated full state"
        );
        definitions
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use game_net::{ClientNetwork, ServerNetwork};
    use serde_json::json;

    use super::super::fixtures::*;
    use super::*;
    use crate::config::GameConfig;
    use crate::error::SyncedValueError;

    #[derive(Default)]
    struct Wire {
        sent: Mutex<Vec<String>>,
    }

    impl Wire {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn record(&self, line: String) {
            self.sent.lock().unwrap().push(line);
        }
    }

    impl ServerNetwork for Wire {
        fn broadcast_synced_value(&self, entity_id: &str, key: &str, value: &Value) {
            self.record(format!("broadcast {entity_id}/{key}={value}"));
        }
        fn broadcast_transform(&self, uid: &str, transform: &Transform2D) {
            self.record(format!("transform {uid} {}", transform.position.x));
        }
        fn broadcast_args(&self, uid: &str, args: &Value) {
            self.record(format!("args {uid} {args}"));
        }
        fn broadcast_custom_message(&self, channel: &str, payload: &Value) {
            self.record(format!("custom * {channel} {payload}"));
        }
        fn send_custom_message(&self, client_id: &str, channel: &str, payload: &Value) {
            self.record(format!("custom {client_id} {channel} {payload}"));
        }
    }

    impl ClientNetwork for Wire {
        fn update_synced_value(&self, entity_id: &str, key: &str, value: &Value) {
            self.record(format!("update {entity_id}/{key}={value}"));
        }
        fn send_custom_message(&self, channel: &str, payload: &Value) {
            self.record(format!("to-server {channel} {payload}"));
        }
    }

    fn server() -> (Game, Arc<Wire>) {
        let game = test_game();
        let wire = Arc::new(Wire::default());
        game.init_network(NetworkHandle::Server(wire.clone())).unwrap();
        (game, wire)
    }

    fn client() -> (Game, Arc<Wire>) {
        let game = test_game();
        let wire = Arc::new(Wire::default());
        game.init_network(NetworkHandle::Client(wire.clone())).unwrap();
        (game, wire)
    }

    #[test]
    fn test_init_network_only_once() {
        let (game, wire) = server();
        let err = game
            .init_network(NetworkHandle::Client(wire))
            .unwrap_err();
        assert!(matches!(err, GameError::NetworkAlreadyInitialized));
        assert_eq!(game.role(), Some(NetworkRole::Server));
    }

    #[test]
    fn test_synced_value_routes_by_role() {
        let (server, server_wire) = server();
        let (client, client_wire) = client();

        let hp = server.synced_value("p1", "hp", 10).unwrap();
        hp.set(10).unwrap();
        hp.set(9).unwrap();
        let score = client.synced_value("p1", "score", 0).unwrap();
        score.set(3).unwrap();

        assert_eq!(server_wire.sent(), vec!["broadcast p1/hp=9"]);
        assert_eq!(client_wire.sent(), vec!["update p1/score=3"]);
    }

    #[test]
    fn test_synced_value_without_network_is_silent() {
        let game = Game::new(GameConfig::default()).unwrap();
        let cell = game.synced_value("p1", "hp", 1).unwrap();
        assert!(cell.set(2).unwrap());
        assert_eq!(cell.get().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_live_synced_value() {
        let game = Game::new(GameConfig::default()).unwrap();
        let first = game.synced_value("p1", "hp", 1).unwrap();
        let err = game.synced_value("p1", "hp", 5).unwrap_err();
        assert!(matches!(err, GameError::DuplicateSyncedValue { .. }));

        first.destroy();
        assert!(game.synced_value("p1", "hp", 5).is_ok());
    }

    #[test]
    fn test_inbound_synced_value_on_client_bypasses_sync() {
        let (game, wire) = client();
        let open = game.synced_value("door-1", "open", false).unwrap();

        game.apply_inbound(NetEvent::SyncedValue(SyncedValueUpdate {
            entity_id: "door-1".into(),
            key: "open".into(),
            value: json!(true),
        }))
        .unwrap();

        assert!(open.get().unwrap());
        assert!(wire.sent().is_empty());
    }

    #[test]
    fn test_inbound_request_on_server_rebroadcasts_changes_only() {
        let (game, wire) = server();
        let open = game.synced_value("door-1", "open", false).unwrap();
        let request = |value: Value| {
            NetEvent::SyncedValue(SyncedValueUpdate {
                entity_id: "door-1".into(),
                key: "open".into(),
                value,
            })
        };

        game.apply_inbound(request(json!(false))).unwrap();
        game.apply_inbound(request(json!(true))).unwrap();

        assert!(open.get().unwrap());
        assert_eq!(wire.sent(), vec!["broadcast door-1/open=true"]);
    }

    #[test]
    fn test_inbound_bad_payload_and_unknown_cell() {
        let (game, _wire) = client();
        let _open = game.synced_value("door-1", "open", false).unwrap();

        let err = game
            .apply_inbound(NetEvent::SyncedValue(SyncedValueUpdate {
                entity_id: "door-1".into(),
                key: "open".into(),
                value: json!("yes"),
            }))
            .unwrap_err();
        assert!(matches!(err, GameError::Synced(SyncedValueError::Json { .. })));

        assert!(
            game.apply_inbound(NetEvent::SyncedValue(SyncedValueUpdate {
                entity_id: "nobody".into(),
                key: "open".into(),
                value: json!(true),
            }))
            .is_ok()
        );
    }

    #[tokio::test]
    async fn test_set_transform_broadcasts_on_server() {
        let (game, wire) = server();
        game.spawn(&solid_def("a", 0.0, 0.0, &[]), false)
            .await
            .unwrap();

        assert!(game.set_transform("a", Transform2D::from_xy(4.0, 0.0)));
        assert!(game.set_args("a", json!({"width": 3, "height": 2})).unwrap());
        assert!(!game.set_transform("missing", Transform2D::IDENTITY));
        assert!(!game.set_args("missing", json!({})).unwrap());

        let spawned = game.lookup("a").unwrap();
        assert_eq!(spawned.transform().position.x, 4.0);
        assert_eq!(spawned.args(), json!({"width": 3, "height": 2}));
        let sent = wire.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], "transform a 4");
        let args = sent[1].strip_prefix("args a ").unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(args).unwrap(),
            json!({"width": 3, "height": 2})
        );
        // The solid's hook moved its body along.
        let solid = spawned.downcast::<TestSolid>().unwrap();
        assert_eq!(solid.moves(), 1);
    }

    #[tokio::test]
    async fn test_inbound_transform_on_client() {
        let (game, wire) = client();
        game.spawn(&solid_def("a", 0.0, 0.0, &[]), false)
            .await
            .unwrap();

        game.apply_inbound(NetEvent::Transform(TransformUpdate {
            uid: "a".into(),
            transform: Transform2D::from_xy(7.0, 1.0),
        }))
        .unwrap();
        game.apply_inbound(NetEvent::Args(ArgsUpdate {
            uid: "a".into(),
            args: json!({"width": 9, "height": 9}),
        }))
        .unwrap();

        let spawned = game.lookup("a").unwrap();
        assert_eq!(spawned.transform().position.x, 7.0);
        assert_eq!(spawned.args()["width"], json!(9));
        assert!(wire.sent().is_empty());
    }

    #[tokio::test]
    async fn test_set_args_checks_schema() {
        let (game, wire) = server();
        game.spawn(&solid_def("a", 0.0, 0.0, &[]), false)
            .await
            .unwrap();

        let err = game.set_args("a", json!({"width": "wide", "height": 2})).unwrap_err();
        assert!(matches!(err, GameError::Validation(ref v) if v.path == "args.width"));
        let err = game.set_args("a", json!([1, 2])).unwrap_err();
        assert!(matches!(err, GameError::Validation(ref v) if v.path == "args"));

        let spawned = game.lookup("a").unwrap();
        assert_eq!(spawned.args(), json!({"width": 2, "height": 2}));
        assert!(wire.sent().is_empty());

        // The stored state still replicates to a fresh game.
        let copy = test_game();
        let definition = spawned.current_definition().to_value().unwrap();
        assert!(copy.spawn(&definition, false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_inbound_args_checked_on_client() {
        let (game, _wire) = client();
        game.spawn(&solid_def("a", 0.0, 0.0, &[]), false)
            .await
            .unwrap();

        let err = game
            .apply_inbound(NetEvent::Args(ArgsUpdate {
                uid: "a".into(),
                args: json!({"width": 9}),
            }))
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(ref v) if v.path == "args.height"));
        assert_eq!(game.lookup("a").unwrap().args()["width"], json!(2));
    }

    #[test]
    fn test_custom_messages() {
        let (server, server_wire) = server();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        server.on_custom_message("chat", move |_game, msg| {
            sink.lock()
                .unwrap()
                .push((msg.from.clone(), msg.payload.clone()));
        });

        server
            .apply_inbound(NetEvent::Custom(CustomMessage {
                channel: "chat".into(),
                payload: json!("hi"),
                from: Some("c1".into()),
            }))
            .unwrap();
        assert!(server.broadcast_custom_message("news", &json!(1)));
        assert!(server.send_custom_message("c1", "dm", &json!(2)));
        assert!(!server.send_to_server("chat", &json!(3)));

        assert_eq!(
            *received.lock().unwrap(),
            vec![(Some("c1".to_string()), json!("hi"))]
        );
        assert_eq!(server_wire.sent(), vec!["custom * news 1", "custom c1 dm 2"]);

        let (client, client_wire) = client();
        assert!(client.send_to_server("chat", &json!("yo")));
        assert!(!client.broadcast_custom_message("news", &json!(1)));
        assert_eq!(client_wire.sent(), vec![r#"to-server chat "yo""#]);
    }

    #[tokio::test]
    async fn test_replicate_full_state() {
        let (game, wire) = server();
        game.spawn(&solid_def("a", 1.0, 0.0, &["t"]), false)
            .await
            .unwrap();
        game.spawn(&solid_def("ghost", 0.0, 0.0, &[]), true)
            .await
            .unwrap();
        let hp = game.synced_value("a", "hp", 3).unwrap();
        let gone = game.synced_value("a", "old", 0).unwrap();
        gone.destroy();

        let defs = game.replicate_full_state();

        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].uid.as_deref(), Some("a"));
        assert_eq!(defs[0].tags, vec!["t"]);
        assert_eq!(wire.sent(), vec!["broadcast a/hp=3"]);
        drop(hp);
    }
}
