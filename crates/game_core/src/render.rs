//! Render collaborator surface.
//!
//! The core only ever writes to the scene graph; it never reads back. A
//! client supplies a [`RenderContext`] when building the game, which makes
//! every entity go through `init_render_context` and the game run one
//! render frame per wall-clock frame.

use std::sync::Arc;

use game_math::Vec2;
use serde::{Deserialize, Serialize};

/// Handle to a node in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// What to create in the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SceneNode {
    Sprite {
        texture: String,
    },
    AnimatedSprite {
        frames: Vec<String>,
        fps: f32,
    },
    /// A filled rectangle, in local coordinates.
    Graphics {
        width: f32,
        height: f32,
        color: u32,
    },
    Container,
}

/// A z-ordered scene graph.
pub trait SceneGraph: Send + Sync {
    /// Create `node` as a child of the stage at depth `z_index`.
    fn add_child(&self, node: SceneNode, z_index: f32) -> NodeId;

    fn remove_child(&self, node: NodeId);

    fn set_position(&self, node: NodeId, position: Vec2);

    fn set_alpha(&self, node: NodeId, alpha: f32);

    fn set_z_index(&self, node: NodeId, z_index: f32);

    fn set_texture(&self, node: NodeId, texture: &str);
}

/// Maps world coordinates onto the screen.
pub trait Camera: Send + Sync {
    /// World-space position of the screen's origin.
    fn offset(&self) -> Vec2;

    fn world_to_screen(&self, world: Vec2) -> Vec2 {
        world - self.offset()
    }
}

/// Scene graph and camera for client-mode games.
#[derive(Clone)]
pub struct RenderContext {
    pub stage: Arc<dyn SceneGraph>,
    pub camera: Arc<dyn Camera>,
}

impl RenderContext {
    #[must_use]
    pub fn new(stage: Arc<dyn SceneGraph>, camera: Arc<dyn Camera>) -> Self {
        Self { stage, camera }
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("camera_offset", &self.camera.offset())
            .finish_non_exhaustive()
    }
}
