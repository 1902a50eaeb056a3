//! Short-lived visual effect. No body; it drifts at a constant velocity,
//! fades out and destroys itself once its lifetime has elapsed.

use std::sync::Arc;

use game_core::{
    ArgsSchema, Entity, EntityData, EntityError, EntityId, FieldType, FrameContext, Game,
    LifecycleContext, LifecycleFuture, NodeId, PhysicsStep, RenderFrame, RenderInitContext,
    SceneNode, Spawnable, SpawnableContext, SpawnedEntity, StepContext, ValidationError,
    entity_data,
};
use game_math::Vec2;
use serde::Deserialize;
use tracing::{trace, warn};

use crate::Xy;

pub const PARTICLE: &str = "particle";

/// Runs after everything else so it sees the tick's final positions.
const PRIORITY: i32 = 100;
const DEFAULT_FPS: f32 = 12.0;

#[derive(Debug, Deserialize)]
struct ParticleArgs {
    lifetime: f64,
    #[serde(default)]
    velocity: Xy,
    #[serde(default)]
    frames: Vec<String>,
    #[serde(default)]
    fps: Option<f32>,
}

/// Simulation record of a [`Particle`].
#[derive(Debug, Clone)]
pub struct ParticleData {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Seconds since spawn.
    pub age: f64,
    pub lifetime: f64,
    expired: bool,
}

impl ParticleData {
    /// Remaining opacity, 1 at spawn and 0 at expiry.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        (1.0 - self.age / self.lifetime).clamp(0.0, 1.0) as f32
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParticleRender {
    pub node: NodeId,
}

pub struct Particle {
    position: Vec2,
    velocity: Vec2,
    lifetime: f64,
    z_index: f32,
    frames: Vec<String>,
    fps: f32,
}

impl Particle {
    #[must_use]
    pub fn schema() -> ArgsSchema {
        let xy = ArgsSchema::new()
            .field("x", FieldType::Number)
            .field("y", FieldType::Number);
        ArgsSchema::new()
            .field("lifetime", FieldType::Number)
            .field("velocity", FieldType::optional(FieldType::Object(xy)))
            .field("frames", FieldType::optional(FieldType::list(FieldType::String)))
            .field("fps", FieldType::optional(FieldType::Number))
    }

    /// Constructor registered under [`PARTICLE`].
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] if `lifetime` is not positive.
    pub fn build(ctx: SpawnableContext) -> Result<Arc<dyn Entity>, ValidationError> {
        let args: ParticleArgs = ctx.args()?;
        if args.lifetime <= 0.0 {
            return Err(ValidationError::new("args.lifetime", "must be positive"));
        }
        Ok(Arc::new(Self {
            position: ctx.transform.position,
            velocity: args.velocity.into(),
            lifetime: args.lifetime,
            z_index: ctx.z_index,
            frames: args.frames,
            fps: args.fps.unwrap_or(DEFAULT_FPS),
        }))
    }

    fn node(&self) -> SceneNode {
        if self.frames.is_empty() {
            SceneNode::Graphics {
                width: 1.0,
                height: 1.0,
                color: 0xff_ff_ff,
            }
        } else {
            SceneNode::AnimatedSprite {
                frames: self.frames.clone(),
                fps: self.fps,
            }
        }
    }
}

/// Destroy `id` on the runtime the loop is driven from.
fn despawn(game: &Game, id: EntityId) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!(%id, "no runtime to despawn expired particle on");
        return;
    };
    let game = game.clone();
    runtime.spawn(async move {
        if let Err(e) = game.destroy(id).await {
            warn!(%id, error = %e, "despawn of expired particle failed");
        }
    });
}

impl Entity for Particle {
    fn name(&self) -> &str {
        PARTICLE
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn init(&self, _ctx: LifecycleContext) -> LifecycleFuture<'_, EntityData> {
        Box::pin(async move {
            Ok(entity_data(ParticleData {
                position: self.position,
                velocity: self.velocity,
                age: 0.0,
                lifetime: self.lifetime,
                expired: false,
            }))
        })
    }

    fn init_render_context(&self, ctx: RenderInitContext) -> LifecycleFuture<'_, EntityData> {
        Box::pin(async move {
            let stage = &ctx.render.stage;
            let node = stage.add_child(self.node(), self.z_index);
            stage.set_position(node, ctx.render.camera.world_to_screen(self.position));
            Ok(entity_data(ParticleRender { node }))
        })
    }

    fn teardown_render_context(&self, ctx: RenderInitContext) -> LifecycleFuture<'_, ()> {
        Box::pin(async move {
            let node = ctx.with_render_data::<ParticleRender, _>(|r| r.node)?;
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

impl PhysicsStep for Particle {
    fn on_physics_step(&self, ctx: &StepContext<'_>) -> Result<(), EntityError> {
        let just_expired = ctx.with_data::<ParticleData, _>(|d| {
            d.age += ctx.delta;
            d.position += d.velocity * ctx.delta as f32;
            let done = d.age >= d.lifetime && !d.expired;
            d.expired |= done;
            done
        })?;
        if just_expired {
            trace!(id = %ctx.id, "particle expired");
            despawn(ctx.game, ctx.id);
        }
        Ok(())
    }
}

impl RenderFrame for Particle {
    fn on_render_frame(&self, ctx: &FrameContext<'_>) -> Result<(), EntityError> {
        let (position, alpha) = ctx.with_data::<ParticleData, _>(|d| {
            // Extrapolate over the part of a tick not yet simulated.
            (d.position + d.velocity * ctx.smooth as f32, d.alpha())
        })?;
        let node = ctx.with_render_data::<ParticleRender, _>(|r| r.node)?;
        let stage = &ctx.render.stage;
        stage.set_position(node, ctx.render.camera.world_to_screen(position));
        stage.set_alpha(node, alpha);
        Ok(())
    }
}

impl Spawnable for Particle {
    /// Particles are never picked.
    fn contains_point(&self, _game: &Game, _id: EntityId, _point: Vec2) -> bool {
        false
    }

    fn on_transform(&self, game: &Game, spawned: &SpawnedEntity) -> Result<(), EntityError> {
        let position = spawned.transform().position;
        game.registry()
            .with_data::<ParticleData, _>(spawned.id(), |d| d.position = position)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use game_core::GameError;
    use serde_json::json;

    use super::*;
    use crate::testing::*;

    #[tokio::test]
    async fn test_particle_drifts_and_expires() {
        let game = server_game(10.0);
        let spawned = game
            .spawn(
                &def(PARTICLE, "spark", 0.0, 0.0, json!({"lifetime": 0.5, "velocity": {"x": 2, "y": 0}})),
                false,
            )
            .await
            .unwrap()
            .unwrap();
        let id = spawned.id();

        game.frame_at(game.started_at() + Duration::from_millis(300));
        let data = game.registry().data::<ParticleData>(id).unwrap();
        assert!((data.position.x - 0.6).abs() < 1e-5);
        assert!((data.alpha() - 0.4).abs() < 1e-5);

        game.frame_at(game.started_at() + Duration::from_millis(600));
        for _ in 0..100 {
            if game.lookup("spark").is_none() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(game.lookup("spark").is_none());
        assert!(!game.registry().has_data(id));
    }

    #[tokio::test]
    async fn test_particle_render_fades_and_extrapolates() {
        let (game, stage) = client_game(10.0);
        game.spawn(
            &def(
                PARTICLE,
                "spark",
                10.0,
                0.0,
                json!({"lifetime": 1, "velocity": {"x": 10, "y": 0}, "frames": ["a.png", "b.png"]}),
            ),
            false,
        )
        .await
        .unwrap();

        // Two ticks plus half a tick of leftover.
        game.frame_at(game.started_at() + Duration::from_millis(250));

        let node = stage.only();
        assert_eq!(
            node.node,
            SceneNode::AnimatedSprite {
                frames: vec!["a.png".into(), "b.png".into()],
                fps: DEFAULT_FPS,
            }
        );
        assert!((node.alpha - 0.8).abs() < 1e-5);
        // World x = 10 + 10 * 0.25, camera at 10.
        assert!((node.position.x - 2.5).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_particle_is_not_pickable() {
        let game = server_game(60.0);
        game.spawn(&def(PARTICLE, "spark", 0.0, 0.0, json!({"lifetime": 1})), false)
            .await
            .unwrap();

        assert!(game.query_position(Vec2::ZERO).is_empty());
        assert_eq!(game.query_type_all::<Particle>().len(), 1);
    }

    #[tokio::test]
    async fn test_particle_needs_positive_lifetime() {
        let game = server_game(60.0);
        let err = game
            .spawn(&def(PARTICLE, "spark", 0.0, 0.0, json!({"lifetime": -1})), false)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(ref v) if v.path == "args.lifetime"));
    }
}
