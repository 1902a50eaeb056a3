//! The [`Game`] facade.
//!
//! `Game` owns the entity list, the data registry, the physics world, the
//! spawnable registry and the network handle. It is a cheap, cloneable
//! handle; entities receive it through their callback contexts.
//!
//! Lifecycle of an entity:
//!
//! 1. `init` builds the simulation record (and registers bodies).
//! 2. On a client, `init_render_context` builds the render record.
//! 3. The entity joins the priority-ordered tick list.
//! 4. `destroy` takes it off the uid map and the list, then runs
//!    `teardown_render_context` and `teardown`, erasing each record after
//!    its teardown and finally unregistering its bodies.

mod query;
mod replication;
mod tick;

#[cfg(test)]
mod fixtures;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, Weak};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use game_net::NetworkHandle;

pub use query::TagQuery;
pub use replication::CustomHandler;
pub use tick::{ListenerId, TickListener};

use crate::config::GameConfig;
use crate::context::{LifecycleContext, RenderInitContext};
use crate::entity::{Entity, EntityAllocator, EntityId};
use crate::error::{EntityError, GameError, ValidationError};
use crate::physics::{PhysicsEngine, PhysicsHandle, SimpleWorld};
use crate::registry::EntityDataRegistry;
use crate::render::RenderContext;
use crate::scheduler::FixedStep;
use crate::spawnable::{
    ArgsSchema, SpawnableContext, SpawnableDefinition, SpawnableRegistry, SpawnedEntity,
};
use crate::synced::ErasedCell;

/// Whether the game renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// No render context: physics only, driven by a timer.
    Headless,
    /// A render context is present: one render frame per wall frame.
    Client,
}

#[derive(Clone)]
struct EntityEntry {
    id: EntityId,
    uid: Option<String>,
    priority: i32,
    entity: Arc<dyn Entity>,
}

/// Live entities in tick order.
#[derive(Default)]
struct EntityList {
    entries: Vec<EntityEntry>,
    /// Cached tick-order snapshot, rebuilt when the list changes.
    snapshot: Option<Arc<[EntityEntry]>>,
}

impl EntityList {
    fn push(&mut self, entry: EntityEntry) {
        self.entries.push(entry);
        // Stable, so equal priorities keep insertion order.
        self.entries.sort_by_key(|e| e.priority);
        self.snapshot = None;
    }

    fn get(&self, id: EntityId) -> Option<&EntityEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn remove(&mut self, id: EntityId) -> Option<EntityEntry> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        self.snapshot = None;
        Some(self.entries.remove(pos))
    }

    fn snapshot(&mut self) -> Arc<[EntityEntry]> {
        let entries = &self.entries;
        Arc::clone(
            self.snapshot
                .get_or_insert_with(|| entries.clone().into()),
        )
    }
}

struct GameInner {
    config: GameConfig,
    allocator: EntityAllocator,
    registry: EntityDataRegistry,
    physics: PhysicsHandle,
    render: Option<RenderContext>,
    entities: Mutex<EntityList>,
    spawned: DashMap<String, SpawnedEntity>,
    spawnables: RwLock<SpawnableRegistry>,
    listeners: Mutex<Vec<(ListenerId, TickListener)>>,
    next_listener: AtomicU64,
    clock: Mutex<FixedStep>,
    network: Arc<OnceLock<NetworkHandle>>,
    synced: DashMap<(String, String), Weak<dyn ErasedCell>>,
    custom_handlers: DashMap<String, CustomHandler>,
    shut_down: AtomicBool,
    stop: watch::Sender<bool>,
    started_at: Instant,
}

/// Builds a [`Game`].
pub struct GameBuilder {
    config: GameConfig,
    render: Option<RenderContext>,
    engine: Option<Box<dyn PhysicsEngine>>,
}

impl GameBuilder {
    #[must_use]
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            render: None,
            engine: None,
        }
    }

    /// Run as a client: entities get render records and render frames.
    #[must_use]
    pub fn with_render(mut self, render: RenderContext) -> Self {
        self.render = Some(render);
        self
    }

    /// Use `engine` instead of the built-in [`SimpleWorld`].
    #[must_use]
    pub fn with_physics_engine(mut self, engine: Box<dyn PhysicsEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// # Errors
    ///
    /// [`GameError::InvalidConfig`] if the config cannot drive the loop.
    pub fn build(self) -> Result<Game, GameError> {
        self.config.validate()?;
        let engine: Box<dyn PhysicsEngine> = match self.engine {
            Some(engine) => engine,
            None => Box::new(SimpleWorld::new().with_gravity(self.config.gravity)),
        };
        let started_at = Instant::now();
        let (stop, _) = watch::channel(false);
        info!(
            tickrate = self.config.physics_tickrate,
            client = self.render.is_some(),
            "game created"
        );
        Ok(Game {
            inner: Arc::new(GameInner {
                clock: Mutex::new(FixedStep::new(self.config.physics_tickrate, started_at)),
                config: self.config,
                allocator: EntityAllocator::new(),
                registry: EntityDataRegistry::new(),
                physics: PhysicsHandle::new(engine),
                render: self.render,
                entities: Mutex::new(EntityList::default()),
                spawned: DashMap::new(),
                spawnables: RwLock::new(SpawnableRegistry::new()),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                network: Arc::new(OnceLock::new()),
                synced: DashMap::new(),
                custom_handlers: DashMap::new(),
                shut_down: AtomicBool::new(false),
                stop,
                started_at,
            }),
        })
    }
}

/// Handle to a running game. Clones share the same game.
#[derive(Clone)]
pub struct Game {
    inner: Arc<GameInner>,
}

impl Game {
    /// A headless game with the built-in physics world.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidConfig`] if the config cannot drive the loop.
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        GameBuilder::new(config).build()
    }

    #[must_use]
    pub fn builder(config: GameConfig) -> GameBuilder {
        GameBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn registry(&self) -> &EntityDataRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn physics(&self) -> &PhysicsHandle {
        &self.inner.physics
    }

    #[must_use]
    pub fn render(&self) -> Option<&RenderContext> {
        self.inner.render.as_ref()
    }

    #[must_use]
    pub fn mode(&self) -> GameMode {
        if self.inner.render.is_some() {
            GameMode::Client
        } else {
            GameMode::Headless
        }
    }

    /// When the game clock started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.inner.started_at
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    // -- Spawnable registration ---------------------------------------------

    /// Register a spawnable type.
    ///
    /// # Errors
    ///
    /// [`GameError::DuplicateSpawnable`] if `name` is already registered.
    pub fn register_spawnable<F>(&self, name: impl Into<String>, constructor: F) -> Result<(), GameError>
    where
        F: Fn(SpawnableContext) -> Result<Arc<dyn Entity>, ValidationError> + Send + Sync + 'static,
    {
        self.register(name.into(), None, Arc::new(constructor))
    }

    /// Register a spawnable type whose `args` must match `schema`.
    ///
    /// # Errors
    ///
    /// [`GameError::DuplicateSpawnable`] if `name` is already registered.
    pub fn register_spawnable_with_schema<F>(
        &self,
        name: impl Into<String>,
        schema: ArgsSchema,
        constructor: F,
    ) -> Result<(), GameError>
    where
        F: Fn(SpawnableContext) -> Result<Arc<dyn Entity>, ValidationError> + Send + Sync + 'static,
    {
        self.register(name.into(), Some(schema), Arc::new(constructor))
    }

    fn register(
        &self,
        name: String,
        schema: Option<ArgsSchema>,
        constructor: crate::spawnable::SpawnConstructor,
    ) -> Result<(), GameError> {
        let mut spawnables = self
            .inner
            .spawnables
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        spawnables.register(name.clone(), schema, constructor)?;
        debug!(name = %name, "registered spawnable");
        Ok(())
    }

    /// Names of all registered spawnable types, sorted.
    #[must_use]
    pub fn spawnable_names(&self) -> Vec<String> {
        self.inner
            .spawnables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Run `entity` through init (and render init on a client), then add it
    /// to the tick list.
    ///
    /// # Errors
    ///
    /// [`GameError::Entity`] if a lifecycle callback fails, in which case
    /// whatever was initialised has been torn down again.
    /// [`GameError::ShutDown`] if the game shut down before init finished.
    pub async fn instantiate(&self, entity: Arc<dyn Entity>) -> Result<EntityId, GameError> {
        let id = self.inner.allocator.allocate();
        self.bring_up(id, &entity).await?;
        self.insert_entry(EntityEntry {
            id,
            uid: None,
            priority: entity.priority(),
            entity,
        });
        Ok(id)
    }

    /// Take an entity off the tick list and tear it down.
    ///
    /// Unknown ids are ignored. Every teardown step runs even if an earlier
    /// one fails; the first failure is returned.
    ///
    /// # Errors
    ///
    /// [`GameError::Entity`] with the first teardown failure.
    pub async fn destroy(&self, id: EntityId) -> Result<(), GameError> {
        // Only the caller that takes the entry off the list tears it down.
        let Some(entry) = self.lock_entities().remove(id) else {
            debug!(%id, "destroy of unknown entity ignored");
            return Ok(());
        };
        if let Some(uid) = &entry.uid {
            self.inner.spawned.remove_if(uid, |_, s| s.id() == id);
        }
        let result = self.tear_down(id, &entry.entity).await;
        debug!(%id, uid = ?entry.uid, "destroyed");
        result.map_err(GameError::from)
    }

    /// Destroy the spawnable with `uid`. Returns `false` if there is none.
    ///
    /// # Errors
    ///
    /// Same as [`destroy`](Self::destroy).
    pub async fn destroy_uid(&self, uid: &str) -> Result<bool, GameError> {
        let Some(id) = self.inner.spawned.get(uid).map(|s| s.id()) else {
            return Ok(false);
        };
        self.destroy(id).await?;
        Ok(true)
    }

    /// Validate and spawn a definition given as JSON.
    ///
    /// Returns `Ok(None)` if the type is not registered.
    ///
    /// # Errors
    ///
    /// [`GameError::Validation`] if the definition or its args are
    /// malformed or its uid is taken, [`GameError::Entity`] if init fails.
    pub async fn spawn(&self, value: &Value, preview: bool) -> Result<Option<SpawnedEntity>, GameError> {
        let definition = SpawnableDefinition::parse(value)?;
        self.spawn_definition(definition, preview).await
    }

    /// Spawn an already parsed definition.
    ///
    /// # Errors
    ///
    /// Same as [`spawn`](Self::spawn).
    pub async fn spawn_definition(
        &self,
        definition: SpawnableDefinition,
        preview: bool,
    ) -> Result<Option<SpawnedEntity>, GameError> {
        let spawn_fn = self
            .inner
            .spawnables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&definition.entity)
            .cloned();
        let Some(spawn_fn) = spawn_fn else {
            warn!(entity = %definition.entity, "unknown spawnable type");
            return Ok(None);
        };

        let uid = definition
            .uid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.inner.spawned.contains_key(&uid) {
            return Err(uid_taken(&uid).into());
        }

        let definition = Arc::new(definition);
        let ctx = SpawnableContext {
            uid: uid.clone(),
            transform: definition.transform,
            tags: definition.tags.clone(),
            z_index: definition.transform.z_index,
            preview,
            definition: Arc::clone(&definition),
        };
        let entity = spawn_fn.build(ctx.clone())?;
        let id = self.inner.allocator.allocate();
        let spawned = SpawnedEntity::new(id, Arc::clone(&entity), &ctx);

        self.bring_up(id, &entity).await?;

        let inserted = match self.inner.spawned.entry(uid.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(spawned.clone());
                true
            }
        };
        if !inserted {
            // Another spawn with the same uid finished first.
            if let Err(e) = self.tear_down(id, &entity).await {
                warn!(%id, error = %e, "teardown of rejected spawn failed");
            }
            return Err(uid_taken(&uid).into());
        }

        self.insert_entry(EntityEntry {
            id,
            uid: Some(uid.clone()),
            priority: entity.priority(),
            entity,
        });
        info!(uid = %uid, entity = %definition.entity, %id, preview, "spawned");
        Ok(Some(spawned))
    }

    /// Spawn every definition concurrently and return those that succeeded.
    /// Failures are logged; they do not affect their siblings.
    pub async fn spawn_many(&self, values: &[Value], preview: bool) -> Vec<SpawnedEntity> {
        let results = join_all(values.iter().map(|v| self.spawn(v, preview))).await;
        results
            .into_iter()
            .enumerate()
            .filter_map(|(index, result)| match result {
                Ok(spawned) => spawned,
                Err(e) => {
                    warn!(index, error = %e, "spawn in batch failed");
                    None
                }
            })
            .collect()
    }

    /// Stop the loop, tear down every entity and clear physics. Idempotent.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.stop.send_replace(true);

        let ids: Vec<EntityId> = self
            .lock_entities()
            .snapshot()
            .iter()
            .map(|e| e.id)
            .collect();
        let count = ids.len();
        for id in ids {
            if let Err(e) = self.destroy(id).await {
                error!(%id, error = %e, "teardown during shutdown failed");
            }
        }
        self.inner.physics.clear();
        info!(entities = count, "game shut down");
    }

    // -- Internals -----------------------------------------------------------

    fn lock_entities(&self) -> MutexGuard<'_, EntityList> {
        self.inner
            .entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn entity_snapshot(&self) -> Arc<[EntityEntry]> {
        self.lock_entities().snapshot()
    }

    fn insert_entry(&self, entry: EntityEntry) {
        self.lock_entities().push(entry);
    }

    fn lifecycle_context(&self, id: EntityId) -> LifecycleContext {
        LifecycleContext {
            game: self.clone(),
            physics: self.inner.physics.clone(),
            id,
        }
    }

    fn render_init_context(&self, id: EntityId, render: &RenderContext) -> RenderInitContext {
        RenderInitContext {
            game: self.clone(),
            render: render.clone(),
            id,
        }
    }

    async fn bring_up(&self, id: EntityId, entity: &Arc<dyn Entity>) -> Result<(), GameError> {
        if self.is_shut_down() {
            return Err(GameError::ShutDown);
        }

        let data = match entity.init(self.lifecycle_context(id)).await {
            Ok(data) => data,
            Err(e) => {
                self.inner.physics.unregister_all(id);
                return Err(e.into());
            }
        };
        self.inner.registry.set_data(id, data);

        if let Some(render) = &self.inner.render {
            let ctx = self.render_init_context(id, render);
            match entity.init_render_context(ctx).await {
                Ok(render_data) => self.inner.registry.set_render_data(id, render_data),
                Err(e) => {
                    if let Err(teardown) = self.tear_down(id, entity).await {
                        warn!(%id, error = %teardown, "teardown after failed render init failed");
                    }
                    return Err(e.into());
                }
            }
        }

        if self.is_shut_down() {
            if let Err(e) = self.tear_down(id, entity).await {
                warn!(%id, error = %e, "teardown of entity initialised during shutdown failed");
            }
            return Err(GameError::ShutDown);
        }
        Ok(())
    }

    async fn tear_down(&self, id: EntityId, entity: &Arc<dyn Entity>) -> Result<(), EntityError> {
        let mut first_error = None;

        if let Some(render) = &self.inner.render
            && self.inner.registry.has_render_data(id)
        {
            let ctx = self.render_init_context(id, render);
            if let Err(e) = entity.teardown_render_context(ctx).await {
                first_error.get_or_insert(e);
            }
            self.inner.registry.remove_render_data(id);
        }

        if let Err(e) = entity.teardown(self.lifecycle_context(id)).await {
            first_error.get_or_insert(e);
        }
        self.inner.registry.remove_data(id);

        let bodies = self.inner.physics.unregister_all(id);
        if bodies > 0 {
            debug!(%id, bodies, "unregistered bodies");
        }

        first_error.map_or(Ok(()), Err)
    }
}

fn uid_taken(uid: &str) -> ValidationError {
    ValidationError::new("uid", format!("'{uid}' is already in use"))
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("mode", &self.mode())
            .field("entities", &self.lock_entities().entries.len())
            .field("spawned", &self.inner.spawned.len())
            .field("network", &self.inner.network.get())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use game_math::Vec2;
    use serde_json::json;

    use super::fixtures::*;
    use super::*;
    use crate::error::{RecordKind, RegistryError};

    #[tokio::test]
    async fn test_render_data_unavailable_until_render_init() {
        let (render, _stage) = test_render();
        let game = Game::builder(GameConfig::default())
            .with_render(render)
            .build()
            .unwrap();
        let tracker = Arc::new(Tracker::new("p"));

        let id = game.instantiate(tracker.clone()).await.unwrap();

        let err = tracker.render_data_error_during_init().unwrap();
        assert_eq!(
            err,
            RegistryError::NotInitialized {
                entity: id,
                record: RecordKind::RenderData,
            }
        );
        assert_eq!(game.registry().render_data::<TrackerRender>(id).unwrap(), TrackerRender(7));
        assert_eq!(game.registry().data::<TrackerData>(id).unwrap(), TrackerData { steps: 0 });
    }

    #[tokio::test]
    async fn test_headless_game_has_no_render_data() {
        let game = Game::new(GameConfig::default()).unwrap();
        let id = game.instantiate(Arc::new(Tracker::new("p"))).await.unwrap();

        assert_eq!(game.mode(), GameMode::Headless);
        assert!(game.registry().has_data(id));
        assert!(!game.registry().has_render_data(id));
    }

    #[tokio::test]
    async fn test_unknown_type_returns_none() {
        let game = test_game();
        let def = solid_def("a", 0.0, 0.0, &[]);
        let mut bad = def.clone();
        bad["entity"] = json!("dragon");

        assert!(game.spawn(&bad, false).await.unwrap().is_none());
        assert_eq!(game.entity_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_with_one_invalid_definition() {
        let game = test_game();
        let mut defs = vec![
            solid_def("a", 0.0, 0.0, &[]),
            solid_def("b", 1.0, 0.0, &[]),
            solid_def("c", 2.0, 0.0, &[]),
            solid_def("d", 3.0, 0.0, &[]),
        ];
        defs[2]["transform"]["position"]["x"] = json!("oops");

        let spawned = game.spawn_many(&defs, false).await;

        assert_eq!(spawned.len(), 3);
        for uid in ["a", "b", "d"] {
            assert!(game.lookup(uid).is_some(), "{uid} should be spawned");
        }
        assert!(game.lookup("c").is_none());
        assert_eq!(game.entity_count(), 3);
    }

    #[tokio::test]
    async fn test_validation_error_reports_path() {
        let game = test_game();
        let mut def = solid_def("a", 0.0, 0.0, &[]);
        def["tags"] = json!(["x", 5]);

        let err = game.spawn(&def, false).await.unwrap_err();
        assert!(matches!(err, GameError::Validation(ref v) if v.path == "tags[1]"));
    }

    #[tokio::test]
    async fn test_args_schema_checked_on_spawn() {
        let game = test_game();
        let mut def = solid_def("a", 0.0, 0.0, &[]);
        def["args"] = json!({"width": "wide", "height": 1});

        let err = game.spawn(&def, false).await.unwrap_err();
        assert!(matches!(err, GameError::Validation(ref v) if v.path == "args.width"));
    }

    #[tokio::test]
    async fn test_duplicate_uid_rejected() {
        let game = test_game();
        game.spawn(&solid_def("a", 0.0, 0.0, &[]), false)
            .await
            .unwrap()
            .unwrap();

        let err = game
            .spawn(&solid_def("a", 5.0, 0.0, &[]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(ref v) if v.path == "uid"));
        assert_eq!(game.entity_count(), 1);
    }

    #[tokio::test]
    async fn test_generated_uid_when_absent() {
        let game = test_game();
        let mut def = solid_def("a", 0.0, 0.0, &[]);
        def.as_object_mut().unwrap().remove("uid");

        let spawned = game.spawn(&def, false).await.unwrap().unwrap();
        assert_eq!(spawned.uid().len(), 36);
        assert!(game.lookup(spawned.uid()).is_some());
    }

    #[test]
    fn test_invalid_tickrate_is_config_error() {
        for rate in [0.0, -1.0, f64::NAN, 5e9] {
            let err = Game::new(GameConfig::default().with_tickrate(rate)).unwrap_err();
            assert!(matches!(err, GameError::InvalidConfig(_)), "tickrate {rate}");
        }
        let render = test_render();
        let built = Game::builder(GameConfig::default().with_tickrate(-60.0))
            .with_render(render.0)
            .build();
        assert!(matches!(built, Err(GameError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_duplicate_spawnable_registration() {
        let game = test_game();
        let err = game
            .register_spawnable("solid", |_ctx| Err(ValidationError::new("", "unused")))
            .unwrap_err();
        assert!(matches!(err, GameError::DuplicateSpawnable(ref name) if name == "solid"));
    }

    #[tokio::test]
    async fn test_lookup_absent_during_own_teardown() {
        let game = test_game();
        let spawned = game
            .spawn(&solid_def("crate-1", 0.0, 0.0, &[]), false)
            .await
            .unwrap()
            .unwrap();
        let solid = spawned.downcast::<TestSolid>().unwrap();

        game.destroy(spawned.id()).await.unwrap();

        assert_eq!(solid.lookup_during_teardown(), Some(false));
        assert!(game.lookup("crate-1").is_none());
    }

    #[tokio::test]
    async fn test_destroy_erases_records_and_bodies() {
        let game = test_game();
        let spawned = game
            .spawn(&solid_def("a", 0.0, 0.0, &[]), false)
            .await
            .unwrap()
            .unwrap();
        let id = spawned.id();
        assert_eq!(game.physics().bodies_of(id).len(), 1);

        game.destroy(id).await.unwrap();

        assert!(!game.registry().has_data(id));
        assert!(game.physics().bodies_of(id).is_empty());
        assert_eq!(game.physics().body_count(), 0);
        assert!(game.entity(id).is_none());
        // Second destroy is a no-op.
        game.destroy(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_client_teardown_order() {
        let (render, stage) = test_render();
        let game = Game::builder(GameConfig::default())
            .with_render(render)
            .build()
            .unwrap();
        let tracker = Arc::new(Tracker::new("p"));
        let id = game.instantiate(tracker.clone()).await.unwrap();
        assert_eq!(stage.live_nodes(), 1);

        game.destroy(id).await.unwrap();

        assert_eq!(
            tracker.events(),
            vec!["init", "init_render", "teardown_render", "teardown"]
        );
        assert_eq!(stage.live_nodes(), 0);
        assert!(!game.registry().has_render_data(id));
    }

    #[tokio::test]
    async fn test_failed_init_does_not_join() {
        let game = Game::new(GameConfig::default()).unwrap();
        let err = game
            .instantiate(Arc::new(Tracker::new("p").failing_init()))
            .await
            .unwrap_err();

        assert!(matches!(err, GameError::Entity(_)));
        assert_eq!(game.entity_count(), 0);
        assert_eq!(game.physics().body_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_tears_down_everything() {
        let game = test_game();
        game.spawn_many(
            &[solid_def("a", 0.0, 0.0, &[]), solid_def("b", 0.0, 0.0, &[])],
            false,
        )
        .await;
        let tracker = Arc::new(Tracker::new("p"));
        game.instantiate(tracker.clone()).await.unwrap();

        game.shutdown().await;
        game.shutdown().await;

        assert!(game.is_shut_down());
        assert_eq!(game.entity_count(), 0);
        assert!(game.registry().is_empty());
        assert_eq!(game.physics().body_count(), 0);
        assert_eq!(tracker.events(), vec!["init", "teardown"]);

        let err = game.instantiate(Arc::new(Tracker::new("late"))).await.unwrap_err();
        assert!(matches!(err, GameError::ShutDown));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_destroys_tear_down_once() {
        for _ in 0..20 {
            let game = test_game();
            let tracker = Arc::new(Tracker::new("p"));
            let id = game.instantiate(tracker.clone()).await.unwrap();

            let racers: Vec<_> = (0..4)
                .map(|_| {
                    let game = game.clone();
                    tokio::spawn(async move { game.destroy(id).await })
                })
                .collect();
            for racer in racers {
                racer.await.unwrap().unwrap();
            }

            assert_eq!(tracker.events(), vec!["init", "teardown"]);
            assert_eq!(game.entity_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_shutdown_during_pending_init() {
        let game = Game::new(GameConfig::default()).unwrap();
        let (gate, tracker) = Tracker::new("slow").gated();
        let tracker = Arc::new(tracker);

        let pending = {
            let game = game.clone();
            let tracker = tracker.clone();
            tokio::spawn(async move { game.instantiate(tracker).await })
        };
        while tracker.events().is_empty() {
            tokio::task::yield_now().await;
        }
        game.shutdown().await;
        gate.send(()).unwrap();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(GameError::ShutDown)));
        assert_eq!(tracker.events(), vec!["init", "teardown"]);
        assert_eq!(game.entity_count(), 0);
    }

    #[tokio::test]
    async fn test_preview_flag_reaches_constructor() {
        let game = test_game();
        let spawned = game
            .spawn(&solid_def("ghost", 0.0, 0.0, &[]), true)
            .await
            .unwrap()
            .unwrap();

        assert!(spawned.is_preview());
        // Preview solids register no body.
        assert_eq!(game.physics().body_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_spawns_allocate_distinct_ids() {
        let game = test_game();
        let defs: Vec<Value> = (0..20)
            .map(|i| solid_def(&format!("s{i}"), i as f32, 0.0, &[]))
            .collect();

        let spawned = game.spawn_many(&defs, false).await;

        let mut ids: Vec<_> = spawned.iter().map(SpawnedEntity::id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
        let placed = spawned
            .iter()
            .filter(|s| {
                let at = Vec2::new(s.transform().position.x, 0.0);
                game.physics().entity_contains_point(s.id(), at)
            })
            .count();
        assert_eq!(placed, 20);
    }
}
