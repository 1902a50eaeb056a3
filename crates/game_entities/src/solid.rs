//! A static, impassable box.

use std::sync::Arc;

use game_core::physics::{Body, BodyHandle};
use game_core::{
    ArgsSchema, Entity, EntityData, EntityError, FieldType, FrameContext, Game, LifecycleContext,
    LifecycleFuture, NodeId, RenderFrame, RenderInitContext, SceneNode, Spawnable,
    SpawnableContext, SpawnedEntity, ValidationError, entity_data,
};
use game_math::Vec2;
use serde::Deserialize;

pub const SOLID: &str = "solid";

const FILL: u32 = 0x5a_5a_6e;
const PREVIEW_ALPHA: f32 = 0.5;

#[derive(Debug, Deserialize)]
struct SolidArgs {
    width: f32,
    height: f32,
    #[serde(default)]
    texture: Option<String>,
}

impl SolidArgs {
    fn parse(args: &serde_json::Value) -> Result<Self, ValidationError> {
        let parsed: Self = serde_json::from_value(args.clone())
            .map_err(|e| ValidationError::new("args", e.to_string()))?;
        if parsed.width <= 0.0 {
            return Err(ValidationError::new("args.width", "must be positive"));
        }
        if parsed.height <= 0.0 {
            return Err(ValidationError::new("args.height", "must be positive"));
        }
        Ok(parsed)
    }

    fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Simulation record of a [`Solid`].
#[derive(Debug, Clone)]
pub struct SolidData {
    /// `None` for previews.
    pub body: Option<BodyHandle>,
    pub position: Vec2,
    pub size: Vec2,
}

/// Render record of a [`Solid`].
#[derive(Debug, Clone, Copy)]
pub struct SolidRender {
    pub node: NodeId,
}

pub struct Solid {
    position: Vec2,
    size: Vec2,
    z_index: f32,
    texture: Option<String>,
    preview: bool,
}

impl Solid {
    #[must_use]
    pub fn schema() -> ArgsSchema {
        ArgsSchema::new()
            .field("width", FieldType::Number)
            .field("height", FieldType::Number)
            .field("texture", FieldType::optional(FieldType::String))
    }

    /// Constructor registered under [`SOLID`].
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] if the size is not positive.
    pub fn build(ctx: SpawnableContext) -> Result<Arc<dyn Entity>, ValidationError> {
        let args = SolidArgs::parse(&ctx.definition.args)?;
        Ok(Arc::new(Self {
            position: ctx.transform.position,
            size: args.size(),
            z_index: ctx.z_index,
            texture: args.texture,
            preview: ctx.preview,
        }))
    }

    fn node(&self) -> SceneNode {
        match &self.texture {
            Some(texture) => SceneNode::Sprite {
                texture: texture.clone(),
            },
            None => SceneNode::Graphics {
                width: self.size.x,
                height: self.size.y,
                color: FILL,
            },
        }
    }
}

impl Entity for Solid {
    fn name(&self) -> &str {
        SOLID
    }

    fn init(&self, ctx: LifecycleContext) -> LifecycleFuture<'_, EntityData> {
        Box::pin(async move {
            let body = (!self.preview)
                .then(|| ctx.physics.register(ctx.id, Body::fixed(self.position, self.size)));
            Ok(entity_data(SolidData {
                body,
                position: self.position,
                size: self.size,
            }))
        })
    }

    fn init_render_context(&self, ctx: RenderInitContext) -> LifecycleFuture<'_, EntityData> {
        Box::pin(async move {
            let stage = &ctx.render.stage;
            let node = stage.add_child(self.node(), self.z_index);
            stage.set_position(node, ctx.render.camera.world_to_screen(self.position));
            if self.preview {
                stage.set_alpha(node, PREVIEW_ALPHA);
            }
            Ok(entity_data(SolidRender { node }))
        })
    }

    fn teardown_render_context(&self, ctx: RenderInitContext) -> LifecycleFuture<'_, ()> {
        Box::pin(async move {
            let node = ctx.with_render_data::<SolidRender, _>(|r| r.node)?;
            ctx.render.stage.remove_child(node);
            Ok(())
        })
    }

    fn render_frame(&self) -> Option<&dyn RenderFrame> {
        Some(self)
    }

    fn spawnable(&self) -> Option<&dyn Spawnable> {
        Some(self)
    }
}

impl RenderFrame for Solid {
    fn on_render_frame(&self, ctx: &FrameContext<'_>) -> Result<(), EntityError> {
        let position = ctx.with_data::<SolidData, _>(|d| d.position)?;
        let node = ctx.with_render_data::<SolidRender, _>(|r| r.node)?;
        ctx.render
            .stage
            .set_position(node, ctx.render.camera.world_to_screen(position));
        Ok(())
    }
}

impl Spawnable for Solid {
    fn on_transform(&self, game: &Game, spawned: &SpawnedEntity) -> Result<(), EntityError> {
        let position = spawned.transform().position;
        let body = game
            .registry()
            .with_data::<SolidData, _>(spawned.id(), |d| {
                d.position = position;
                d.body
            })?;
        if let Some(body) = body {
            game.physics().with_body(body, |b| b.position = position)?;
        }
        Ok(())
    }

    fn on_args(&self, game: &Game, spawned: &SpawnedEntity) -> Result<(), EntityError> {
        let size = SolidArgs::parse(&spawned.args())?.size();
        let body = game
            .registry()
            .with_data::<SolidData, _>(spawned.id(), |d| {
                d.size = size;
                d.body
            })?;
        if let Some(body) = body {
            game.physics().with_body(body, |b| b.size = size)?;
        }
        Ok(())
    }
}
