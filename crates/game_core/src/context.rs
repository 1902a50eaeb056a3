//! Contexts handed to entity callbacks.
//!
//! Entities never reach for a global "current game". Everything a callback
//! may touch is passed in explicitly: the [`Game`] handle, the physics world,
//! the entity's own id, and, for render callbacks, the render collaborators.

use std::any::Any;

use crate::entity::EntityId;
use crate::error::RegistryError;
use crate::game::Game;
use crate::physics::PhysicsHandle;
use crate::render::RenderContext;

/// Passed to `init` and `teardown`.
#[derive(Clone)]
pub struct LifecycleContext {
    /// The owning game.
    pub game: Game,
    /// The shared physics world.
    pub physics: PhysicsHandle,
    /// The entity being initialised or torn down.
    pub id: EntityId,
}

impl LifecycleContext {
    /// Run `f` on this entity's simulation record.
    ///
    /// # Errors
    ///
    /// See [`EntityDataRegistry::with_data`](crate::registry::EntityDataRegistry::with_data).
    pub fn with_data<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, RegistryError> {
        self.game.registry().with_data(self.id, f)
    }
}

/// Passed to `init_render_context` and `teardown_render_context`.
#[derive(Clone)]
pub struct RenderInitContext {
    /// The owning game.
    pub game: Game,
    /// Scene graph and camera.
    pub render: RenderContext,
    /// The entity being set up for rendering.
    pub id: EntityId,
}

impl RenderInitContext {
    /// Run `f` on this entity's simulation record.
    ///
    /// # Errors
    ///
    /// See [`EntityDataRegistry::with_data`](crate::registry::EntityDataRegistry::with_data).
    pub fn with_data<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, RegistryError> {
        self.game.registry().with_data(self.id, f)
    }

    /// Run `f` on this entity's render record.
    ///
    /// # Errors
    ///
    /// See [`EntityDataRegistry::with_render_data`](crate::registry::EntityDataRegistry::with_render_data).
    pub fn with_render_data<T: Any, R>(
        &self,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, RegistryError> {
        self.game.registry().with_render_data(self.id, f)
    }
}

/// Passed to [`PhysicsStep::on_physics_step`](crate::entity::PhysicsStep::on_physics_step).
pub struct StepContext<'a> {
    /// The owning game.
    pub game: &'a Game,
    /// The entity being stepped.
    pub id: EntityId,
    /// Fixed step length in seconds.
    pub delta: f64,
    /// Seconds since the game started.
    pub time: f64,
}

impl StepContext<'_> {
    /// The shared physics world.
    #[must_use]
    pub fn physics(&self) -> &PhysicsHandle {
        self.game.physics()
    }

    /// Run `f` on this entity's simulation record.
    ///
    /// # Errors
    ///
    /// See [`EntityDataRegistry::with_data`](crate::registry::EntityDataRegistry::with_data).
    pub fn with_data<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, RegistryError> {
        self.game.registry().with_data(self.id, f)
    }
}

/// Passed to [`RenderFrame::on_render_frame`](crate::entity::RenderFrame::on_render_frame).
pub struct FrameContext<'a> {
    /// The owning game.
    pub game: &'a Game,
    /// Scene graph and camera.
    pub render: &'a RenderContext,
    /// The entity being drawn.
    pub id: EntityId,
    /// Wall-clock seconds since the previous frame.
    pub delta: f64,
    /// Seconds since the game started.
    pub time: f64,
    /// Seconds of simulation not yet consumed by a fixed tick. Interpolate
    /// with `position + velocity * smooth`.
    pub smooth: f64,
}

impl FrameContext<'_> {
    /// Run `f` on this entity's simulation record.
    ///
    /// # Errors
    ///
    /// See [`EntityDataRegistry::with_data`](crate::registry::EntityDataRegistry::with_data).
    pub fn with_data<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, RegistryError> {
        self.game.registry().with_data(self.id, f)
    }

    /// Run `f` on this entity's render record.
    ///
    /// # Errors
    ///
    /// See [`EntityDataRegistry::with_render_data`](crate::registry::EntityDataRegistry::with_render_data).
    pub fn with_render_data<T: Any, R>(
        &self,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, RegistryError> {
        self.game.registry().with_render_data(self.id, f)
    }
}
