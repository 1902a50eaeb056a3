//! Error types for the game core.
//!
//! Configuration errors and contract violations surface as [`GameError`]
//! variants and are returned to the caller immediately. Entity callbacks
//! report failures as [`EntityError`].

use game_net::NetError;

use crate::entity::EntityId;
use crate::physics::BodyHandle;

/// Which of an entity's two records a registry access targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Simulation data produced by `init`.
    Data,
    /// Render data produced by `init_render_context`.
    RenderData,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::RenderData => f.write_str("render data"),
        }
    }
}

/// Errors raised by the entity data registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The record was read before it was ever set (or after it was erased).
    #[error("{record} for {entity} is not initialized")]
    NotInitialized { entity: EntityId, record: RecordKind },

    /// The record exists but holds a different type.
    #[error("{record} for {entity} is not a {expected}")]
    TypeMismatch {
        entity: EntityId,
        record: RecordKind,
        expected: &'static str,
    },
}

/// A spawnable definition or argument payload failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid definition at '{path}': {message}")]
pub struct ValidationError {
    /// Dotted path of the failing field, e.g. `transform.position.x`.
    pub path: String,
    /// What was wrong with it.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Misuse of a synced value.
#[derive(Debug, thiserror::Error)]
pub enum SyncedValueError {
    /// The cell was destroyed; it can no longer be read or written.
    #[error("use of destroyed synced value {entity_id}/{key}")]
    Destroyed { entity_id: String, key: String },

    /// The value could not be converted to or from JSON.
    #[error("synced value {entity_id}/{key} is not JSON-compatible: {source}")]
    Json {
        entity_id: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the physics adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhysicsError {
    /// No body with this handle exists in the world.
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),

    /// The body is already registered to another entity.
    #[error("body {body:?} is already owned by {owner}")]
    BodyAlreadyOwned { body: BodyHandle, owner: EntityId },

    /// The body is not registered to the entity that tried to remove it.
    #[error("body {body:?} is not owned by {entity}")]
    NotOwner { body: BodyHandle, entity: EntityId },
}

/// Failure reported by an entity lifecycle or tick callback.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// Registry access failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Physics access failed.
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    /// A synced value was misused.
    #[error(transparent)]
    Synced(#[from] SyncedValueError),

    /// Arguments did not have the expected shape.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Any other entity-specific failure.
    #[error("{0}")]
    Other(String),
}

impl EntityError {
    /// Create an entity-specific error from a message.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Errors returned by the [`Game`](crate::Game) facade.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// A spawnable function with this name is already registered.
    #[error("spawnable function '{0}' is already registered")]
    DuplicateSpawnable(String),

    /// A [`GameConfig`](crate::GameConfig) value cannot drive the loop.
    #[error("invalid game config: {0}")]
    InvalidConfig(String),

    /// A query was given a parameter it does not understand.
    #[error("invalid query parameter: {0}")]
    InvalidQuery(String),

    /// `init_network` was called more than once.
    #[error("network handle is already initialized")]
    NetworkAlreadyInitialized,

    /// A live synced value already exists under this key.
    #[error("synced value {entity_id}/{key} already exists")]
    DuplicateSyncedValue { entity_id: String, key: String },

    /// The game has shut down; no more entities can be instantiated.
    #[error("game has shut down")]
    ShutDown,

    /// A spawnable definition was malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An entity lifecycle callback failed.
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Registry contract violation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Synced value misuse.
    #[error(transparent)]
    Synced(#[from] SyncedValueError),

    /// Physics adapter failure.
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    /// Network failure.
    #[error(transparent)]
    Net(#[from] NetError),
}
