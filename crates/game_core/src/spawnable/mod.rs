//! Spawnable entities: definitions, argument schemas, the constructor
//! registry and the live [`SpawnedEntity`] handle.

pub mod definition;
pub mod factory;
pub mod schema;

use std::sync::{Arc, PoisonError, RwLock};

use game_math::{Transform2D, Vec2};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use definition::SpawnableDefinition;
pub use factory::{SpawnConstructor, SpawnableFn, SpawnableRegistry};
pub use schema::{ArgsSchema, FieldType};

use crate::entity::{Entity, EntityId, downcast_entity};
use crate::error::{EntityError, ValidationError};
use crate::game::Game;

/// Everything a constructor gets to build a spawnable entity.
#[derive(Debug, Clone)]
pub struct SpawnableContext {
    pub uid: String,
    pub transform: Transform2D,
    pub tags: Vec<String>,
    pub z_index: f32,
    /// Ghost placement: no solid side effects.
    pub preview: bool,
    /// The definition as parsed.
    pub definition: Arc<SpawnableDefinition>,
}

impl SpawnableContext {
    /// Deserialise the definition's `args`.
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] at path `args` if they do not fit `T`.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        serde_json::from_value(self.definition.args.clone())
            .map_err(|e| ValidationError::new("args", e.to_string()))
    }
}

/// Hooks for entities created from definitions.
pub trait Spawnable: Send + Sync {
    /// Whether `point` is inside this entity. Defaults to testing the
    /// bodies it registered with the physics world.
    fn contains_point(&self, game: &Game, id: EntityId, point: Vec2) -> bool {
        game.physics().entity_contains_point(id, point)
    }

    /// Called after the transform of `spawned` was replaced.
    fn on_transform(&self, _game: &Game, _spawned: &SpawnedEntity) -> Result<(), EntityError> {
        Ok(())
    }

    /// Called after the args of `spawned` were replaced.
    fn on_args(&self, _game: &Game, _spawned: &SpawnedEntity) -> Result<(), EntityError> {
        Ok(())
    }
}

struct SpawnedInner {
    id: EntityId,
    uid: String,
    entity: Arc<dyn Entity>,
    tags: Vec<String>,
    preview: bool,
    definition: Arc<SpawnableDefinition>,
    transform: RwLock<Transform2D>,
    args: RwLock<Value>,
}

/// A live spawnable entity. Cheap to clone.
#[derive(Clone)]
pub struct SpawnedEntity {
    inner: Arc<SpawnedInner>,
}

impl SpawnedEntity {
    pub(crate) fn new(id: EntityId, entity: Arc<dyn Entity>, ctx: &SpawnableContext) -> Self {
        Self {
            inner: Arc::new(SpawnedInner {
                id,
                uid: ctx.uid.clone(),
                entity,
                tags: ctx.tags.clone(),
                preview: ctx.preview,
                definition: Arc::clone(&ctx.definition),
                transform: RwLock::new(ctx.transform),
                args: RwLock::new(ctx.definition.args.clone()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.inner.uid
    }

    #[must_use]
    pub fn entity(&self) -> &Arc<dyn Entity> {
        &self.inner.entity
    }

    /// The entity as its concrete type.
    #[must_use]
    pub fn downcast<T: Entity>(&self) -> Option<Arc<T>> {
        downcast_entity(&self.inner.entity)
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.inner.tags
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.inner.tags.iter().any(|t| t == tag)
    }

    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.inner.preview
    }

    /// Current transform.
    #[must_use]
    pub fn transform(&self) -> Transform2D {
        *self
            .inner
            .transform
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current args.
    #[must_use]
    pub fn args(&self) -> Value {
        self.inner
            .args
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The definition this entity was spawned from, unchanged.
    #[must_use]
    pub fn definition(&self) -> &SpawnableDefinition {
        &self.inner.definition
    }

    /// A definition describing the current state, with the uid filled in.
    #[must_use]
    pub fn current_definition(&self) -> SpawnableDefinition {
        SpawnableDefinition {
            entity: self.inner.definition.entity.clone(),
            uid: Some(self.inner.uid.clone()),
            transform: self.transform(),
            tags: self.inner.tags.clone(),
            args: self.args(),
        }
    }

    pub(crate) fn replace_transform(&self, transform: Transform2D) {
        *self
            .inner
            .transform
            .write()
            .unwrap_or_else(PoisonError::into_inner) = transform;
    }

    pub(crate) fn replace_args(&self, args: Value) {
        *self
            .inner
            .args
            .write()
            .unwrap_or_else(PoisonError::into_inner) = args;
    }
}

impl std::fmt::Debug for SpawnedEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedEntity")
            .field("id", &self.inner.id)
            .field("uid", &self.inner.uid)
            .field("entity", &self.inner.entity.name())
            .field("tags", &self.inner.tags)
            .field("preview", &self.inner.preview)
            .finish_non_exhaustive()
    }
}
