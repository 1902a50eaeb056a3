//! # game_core
//!
//! Entity lifecycle and synchronization core for a 2D multiplayer game.
//!
//! - [`game`]: the [`Game`] facade, with lifecycle, the dual-rate loop,
//!   queries and replication.
//! - [`entity`]: [`EntityId`] allocation and the [`Entity`] trait.
//! - [`registry`]: per-entity simulation and render records.
//! - [`synced`]: [`SyncedValue`], a change-detected replicated cell.
//! - [`spawnable`]: definitions, argument schemas and the constructor
//!   registry.
//! - [`physics`]: body ownership over a pluggable [`PhysicsEngine`].
//! - [`scheduler`]: the fixed-step accumulator.
//! - [`render`]: the scene-graph and camera surface clients supply.
//! - [`config`]: [`GameConfig`].
//! - [`error`]: error types.

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod game;
pub mod physics;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod spawnable;
pub mod synced;

pub use config::GameConfig;
pub use context::{FrameContext, LifecycleContext, RenderInitContext, StepContext};
pub use entity::{
    Entity, EntityData, EntityId, LifecycleFuture, PhysicsStep, RenderFrame, downcast_entity,
    entity_data,
};
pub use error::{
    EntityError, GameError, PhysicsError, RecordKind, RegistryError, SyncedValueError,
    ValidationError,
};
pub use game::{CustomHandler, Game, GameBuilder, GameMode, ListenerId, TagQuery, TickListener};
pub use physics::{Body, BodyHandle, CollisionFilter, PhysicsEngine, PhysicsHandle};
pub use registry::EntityDataRegistry;
pub use render::{Camera, NodeId, RenderContext, SceneGraph, SceneNode};
pub use spawnable::{
    ArgsSchema, FieldType, Spawnable, SpawnableContext, SpawnableDefinition, SpawnedEntity,
};
pub use synced::{SyncHook, SyncedData, SyncedValue};
