//! A box that net players can be let through.
//!
//! The server owns a synced `active` flag per platform. While it is set the
//! platform's mask includes [`CATEGORY_NET_PLAYER`] and net players land on
//! it; when cleared they fall through. Local players always collide.

use std::sync::Arc;

use game_core::physics::{Body, BodyHandle, CATEGORY_NET_PLAYER, CollisionFilter};
use game_core::{
    ArgsSchema, Entity, EntityData, EntityError, EntityId, FieldType, FrameContext, Game,
    LifecycleContext, LifecycleFuture, NodeId, PhysicsStep, RegistryError, RenderFrame,
    RenderInitContext, SceneNode, Spawnable, SpawnableContext, StepContext, SyncedValue,
    ValidationError, entity_data,
};
use game_math::Vec2;
use serde::Deserialize;
use tracing::debug;

pub const PLATFORM: &str = "platform";

/// Synced-value key of the `active` flag.
pub const ACTIVE_KEY: &str = "active";

const FILL: u32 = 0x3c_8d_5a;
const INACTIVE_ALPHA: f32 = 0.35;

#[derive(Debug, Deserialize)]
struct PlatformArgs {
    width: f32,
    height: f32,
    #[serde(default = "active_by_default")]
    active: bool,
}

fn active_by_default() -> bool {
    true
}

/// Simulation record of a [`Platform`].
pub struct PlatformData {
    pub body: Option<BodyHandle>,
    pub active: SyncedValue<bool>,
    /// The flag as last applied to the body.
    applied: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PlatformRender {
    pub node: NodeId,
}

pub struct Platform {
    uid: String,
    position: Vec2,
    size: Vec2,
    z_index: f32,
    active: bool,
    preview: bool,
}

impl Platform {
    #[must_use]
    pub fn schema() -> ArgsSchema {
        ArgsSchema::new()
            .field("width", FieldType::Number)
            .field("height", FieldType::Number)
            .field("active", FieldType::optional(FieldType::Bool))
    }

    /// Constructor registered under [`PLATFORM`].
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] if the args do not describe a platform.
    pub fn build(ctx: SpawnableContext) -> Result<Arc<dyn Entity>, ValidationError> {
        let args: PlatformArgs = ctx.args()?;
        if args.width <= 0.0 || args.height <= 0.0 {
            return Err(ValidationError::new("args", "size must be positive"));
        }
        Ok(Arc::new(Self {
            uid: ctx.uid,
            position: ctx.transform.position,
            size: Vec2::new(args.width, args.height),
            z_index: ctx.z_index,
            active: args.active,
            preview: ctx.preview,
        }))
    }

    /// The `active` cell of the live platform `id`.
    ///
    /// # Errors
    ///
    /// [`RegistryError`] if `id` is not a platform that finished init.
    pub fn active(game: &Game, id: EntityId) -> Result<SyncedValue<bool>, RegistryError> {
        game.registry()
            .with_data::<PlatformData, _>(id, |d| d.active.clone())
    }

    fn filter(active: bool) -> CollisionFilter {
        let mut filter = CollisionFilter::default();
        filter.set_mask_bits(CATEGORY_NET_PLAYER, active);
        filter
    }
}

impl Entity for Platform {
    fn name(&self) -> &str {
        PLATFORM
    }

    fn init(&self, ctx: LifecycleContext) -> LifecycleFuture<'_, EntityData> {
        Box::pin(async move {
            let active = ctx
                .game
                .synced_value(self.uid.clone(), ACTIVE_KEY, self.active)
                .map_err(|e| EntityError::other(e.to_string()))?;
            let body = (!self.preview).then(|| {
                let body =
                    Body::fixed(self.position, self.size).with_filter(Self::filter(self.active));
                ctx.physics.register(ctx.id, body)
            });
            Ok(entity_data(PlatformData {
                body,
                active,
                applied: self.active,
            }))
        })
    }

    fn teardown(&self, ctx: LifecycleContext) -> LifecycleFuture<'_, ()> {
        Box::pin(async move {
            ctx.with_data::<PlatformData, _>(|d| d.active.destroy())?;
            Ok(())
        })
    }

    fn init_render_context(&self, ctx: RenderInitContext) -> LifecycleFuture<'_, EntityData> {
        Box::pin(async move {
            let stage = &ctx.render.stage;
            let node = stage.add_child(
                SceneNode::Graphics {
                    width: self.size.x,
                    height: self.size.y,
                    color: FILL,
                },
                self.z_index,
            );
            stage.set_position(node, ctx.render.camera.world_to_screen(self.position));
            Ok(entity_data(PlatformRender { node }))
        })
    }

    fn teardown_render_context(&self, ctx: RenderInitContext) -> LifecycleFuture<'_, ()> {
        Box::pin(async move {
            let node = ctx.with_render_data::<PlatformRender, _>(|r| r.node)?;
            ctx.render.stage.remove_child(node);
            Ok(())
        })
    }

    fn physics_step(&self) -> Option<&dyn PhysicsStep> {
        Some(self)
    }

    fn render_frame(&self) -> Option<&dyn RenderFrame> {
        Some(self)
    }

    fn spawnable(&self) -> Option<&dyn Spawnable> {
        Some(self)
    }
}

impl PhysicsStep for Platform {
    fn on_physics_step(&self, ctx: &StepContext<'_>) -> Result<(), EntityError> {
        let (body, active, applied) = ctx.with_data::<PlatformData, _>(|d| {
            (d.body, d.active.get(), d.applied)
        })?;
        let active = active?;
        if active == applied {
            return Ok(());
        }
        if let Some(body) = body {
            ctx.physics()
                .with_body(body, |b| b.filter.set_mask_bits(CATEGORY_NET_PLAYER, active))?;
        }
        ctx.with_data::<PlatformData, _>(|d| d.applied = active)?;
        debug!(uid = %self.uid, active, "platform toggled");
        Ok(())
    }
}

impl RenderFrame for Platform {
    fn on_render_frame(&self, ctx: &FrameContext<'_>) -> Result<(), EntityError> {
        let active = ctx.with_data::<PlatformData, _>(|d| d.applied)?;
        let node = ctx.with_render_data::<PlatformRender, _>(|r| r.node)?;
        let alpha = if active { 1.0 } else { INACTIVE_ALPHA };
        ctx.render.stage.set_alpha(node, alpha);
        Ok(())
    }
}

impl Spawnable for Platform {}
