use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use game_core::{Camera, Game, GameConfig, NodeId, RenderContext, SceneGraph, SceneNode};
use game_math::Vec2;
use serde_json::{Value, json};

use crate::register_defaults;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    pub node: SceneNode,
    pub z_index: f32,
    pub position: Vec2,
    pub alpha: f32,
}

#[derive(Default)]
pub struct RecordingStage {
    next: AtomicU64,
    nodes: Mutex<HashMap<NodeId, NodeState>>,
}

impl RecordingStage {
    pub fn nodes(&self) -> Vec<NodeState> {
        self.nodes.lock().unwrap().values().cloned().collect()
    }

    pub fn only(&self) -> NodeState {
        let nodes = self.nodes();
        assert_eq!(nodes.len(), 1, "expected exactly one node");
        nodes[0].clone()
    }

    fn edit(&self, node: NodeId, f: impl FnOnce(&mut NodeState)) {
        if let Some(state) = self.nodes.lock().unwrap().get_mut(&node) {
            f(state);
        }
    }
}

impl SceneGraph for RecordingStage {
    fn add_child(&self, node: SceneNode, z_index: f32) -> NodeId {
        let id = NodeId(self.next.fetch_add(1, Ordering::Relaxed));
        self.nodes.lock().unwrap().insert(
            id,
            NodeState {
                node,
                z_index,
                position: Vec2::ZERO,
                alpha: 1.0,
            },
        );
        id
    }

    fn remove_child(&self, node: NodeId) {
        self.nodes.lock().unwrap().remove(&node);
    }

    fn set_position(&self, node: NodeId, position: Vec2) {
        self.edit(node, |s| s.position = position);
    }

    fn set_alpha(&self, node: NodeId, alpha: f32) {
        self.edit(node, |s| s.alpha = alpha);
    }

    fn set_z_index(&self, node: NodeId, z_index: f32) {
        self.edit(node, |s| s.z_index = z_index);
    }

    fn set_texture(&self, node: NodeId, texture: &str) {
        self.edit(node, |s| {
            s.node = SceneNode::Sprite {
                texture: texture.to_string(),
            }
        });
    }
}

pub struct OffsetCamera(pub Vec2);

impl Camera for OffsetCamera {
    fn offset(&self) -> Vec2 {
        self.0
    }
}

pub fn server_game(tickrate: f64) -> Game {
    let game = Game::new(GameConfig::default().with_tickrate(tickrate)).unwrap();
    register_defaults(&game).unwrap();
    game
}

/// A client game whose camera sits at `(10, 0)`.
pub fn client_game(tickrate: f64) -> (Game, Arc<RecordingStage>) {
    let stage = Arc::new(RecordingStage::default());
    let render = RenderContext::new(stage.clone(), Arc::new(OffsetCamera(Vec2::new(10.0, 0.0))));
    let game = Game::builder(GameConfig::default().with_tickrate(tickrate))
        .with_render(render)
        .build()
        .unwrap();
    register_defaults(&game).unwrap();
    (game, stage)
}

pub fn def(entity: &str, uid: &str, x: f32, y: f32, args: Value) -> Value {
    json!({
        "entity": entity,
        "uid": uid,
        "transform": {
            "position": { "x": x, "y": y },
            "rotation": 0.0,
            "zIndex": 1.0,
        },
        "tags": [],
        "args": args,
    })
}
