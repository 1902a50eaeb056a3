//! Entity identity, allocation and the [`Entity`] lifecycle trait.
//!
//! An entity is a polymorphic unit of simulation. It does not store its
//! runtime state itself: `init` produces an opaque simulation record and
//! `init_render_context` an opaque render record, both kept by the
//! [`EntityDataRegistry`](crate::registry::EntityDataRegistry).
//!
//! Optional per-tick behaviour is exposed through capability accessors
//! ([`Entity::physics_step`], [`Entity::render_frame`],
//! [`Entity::spawnable`]) so the scheduler can ask "does this entity step"
//! without reflection.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};

use crate::context::{FrameContext, LifecycleContext, RenderInitContext, StepContext};
use crate::error::EntityError;
use crate::spawnable::Spawnable;

/// A process-local entity identifier.
///
/// Spawnable entities additionally carry a globally unique string UID; the
/// id is what the registry, physics table and entity list are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The null / invalid entity sentinel.
    pub const INVALID: EntityId = EntityId(0);

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) entity.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates monotonically increasing entity IDs.
///
/// Shared by concurrent spawns, hence atomic.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: AtomicU64,
}

impl EntityAllocator {
    /// Creates a new allocator. IDs start at 1 (0 is reserved for [`EntityId::INVALID`]).
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh entity ID.
    pub fn allocate(&self) -> EntityId {
        EntityId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the number of entities allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// An opaque simulation or render record.
pub type EntityData = Box<dyn Any + Send + Sync>;

/// Future returned by the asynchronous lifecycle callbacks.
pub type LifecycleFuture<'a, T> = BoxFuture<'a, Result<T, EntityError>>;

/// Box a value as an [`EntityData`] record.
pub fn entity_data<T: Any + Send + Sync>(value: T) -> EntityData {
    Box::new(value)
}

/// Upcasting helpers used for type-guard queries.
pub trait AsAny: Any + Send + Sync {
    /// Borrow as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared pointer into `Arc<dyn Any>` for downcasting.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A unit of simulation driven by the [`Game`](crate::Game).
///
/// Lifecycle: `init` → (client) `init_render_context` → ticks →
/// (client) `teardown_render_context` → `teardown`. The entity only joins
/// the tick loop after every init future has resolved.
pub trait Entity: AsAny {
    /// Human-readable type name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Tick order; lower runs first. Ties keep insertion order.
    fn priority(&self) -> i32 {
        0
    }

    /// Build the simulation record. Body registration belongs here.
    fn init(&self, ctx: LifecycleContext) -> LifecycleFuture<'_, EntityData>;

    /// Release whatever `init` acquired. The simulation record is still
    /// readable and is erased right after this resolves.
    fn teardown(&self, _ctx: LifecycleContext) -> LifecycleFuture<'_, ()> {
        Box::pin(future::ready(Ok(())))
    }

    /// Build the render record. Only called when a render context is active.
    fn init_render_context(&self, _ctx: RenderInitContext) -> LifecycleFuture<'_, EntityData> {
        Box::pin(future::ready(Ok(entity_data(()))))
    }

    /// Release whatever `init_render_context` acquired.
    fn teardown_render_context(&self, _ctx: RenderInitContext) -> LifecycleFuture<'_, ()> {
        Box::pin(future::ready(Ok(())))
    }

    /// Fixed-rate callback capability.
    fn physics_step(&self) -> Option<&dyn PhysicsStep> {
        None
    }

    /// Per-frame render callback capability.
    fn render_frame(&self) -> Option<&dyn RenderFrame> {
        None
    }

    /// Spawnable hooks, for entities created from definitions.
    fn spawnable(&self) -> Option<&dyn Spawnable> {
        None
    }
}

/// Called once per fixed physics tick.
pub trait PhysicsStep: Send + Sync {
    /// Advance this entity by `ctx.delta` seconds.
    fn on_physics_step(&self, ctx: &StepContext<'_>) -> Result<(), EntityError>;
}

/// Called once per rendered frame (client only).
pub trait RenderFrame: Send + Sync {
    /// Update the scene graph for this frame.
    fn on_render_frame(&self, ctx: &FrameContext<'_>) -> Result<(), EntityError>;
}

/// Downcast a shared entity to its concrete type.
#[must_use]
pub fn downcast_entity<T: Entity>(entity: &Arc<dyn Entity>) -> Option<Arc<T>> {
    Arc::clone(entity).into_any().downcast::<T>().ok()
}
