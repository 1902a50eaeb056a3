//! Shared test entities and collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use game_math::Vec2;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::oneshot;

use super::Game;
use crate::config::GameConfig;
use crate::context::{FrameContext, LifecycleContext, RenderInitContext, StepContext};
use crate::entity::{
    Entity, EntityData, LifecycleFuture, PhysicsStep, RenderFrame, entity_data,
};
use crate::error::{EntityError, RegistryError, ValidationError};
use crate::physics::{Body, BodyHandle};
use crate::render::{Camera, NodeId, RenderContext, SceneGraph, SceneNode};
use crate::spawnable::{ArgsSchema, FieldType, Spawnable, SpawnableContext, SpawnedEntity};

// -- Render collaborators -----------------------------------------------------

#[derive(Default)]
pub struct TestStage {
    next: AtomicU64,
    nodes: Mutex<HashMap<NodeId, SceneNode>>,
}

impl TestStage {
    pub fn live_nodes(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }
}

impl SceneGraph for TestStage {
    fn add_child(&self, node: SceneNode, _z_index: f32) -> NodeId {
        let id = NodeId(self.next.fetch_add(1, Ordering::Relaxed));
        self.nodes.lock().unwrap().insert(id, node);
        id
    }

    fn remove_child(&self, node: NodeId) {
        self.nodes.lock().unwrap().remove(&node);
    }

    fn set_position(&self, _node: NodeId, _position: Vec2) {}

    fn set_alpha(&self, _node: NodeId, _alpha: f32) {}

    fn set_z_index(&self, _node: NodeId, _z_index: f32) {}

    fn set_texture(&self, _node: NodeId, _texture: &str) {}
}

struct StillCamera;

impl Camera for StillCamera {
    fn offset(&self) -> Vec2 {
        Vec2::ZERO
    }
}

pub fn test_render() -> (RenderContext, Arc<TestStage>) {
    let stage = Arc::new(TestStage::default());
    (RenderContext::new(stage.clone(), Arc::new(StillCamera)), stage)
}

// -- Tracker ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerData {
    pub steps: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerRender(pub u32);

/// Records every callback it receives.
pub struct Tracker {
    label: String,
    priority: i32,
    fail_init: bool,
    fail_step: bool,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    events: Mutex<Vec<String>>,
    log: Option<Arc<Mutex<Vec<String>>>>,
    render_error: Mutex<Option<RegistryError>>,
    node: Mutex<Option<NodeId>>,
    last_step: Mutex<Option<(f64, f64)>>,
}

impl Tracker {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            priority: 0,
            fail_init: false,
            fail_step: false,
            gate: Mutex::new(None),
            events: Mutex::new(Vec::new()),
            log: None,
            render_error: Mutex::new(None),
            node: Mutex::new(None),
            last_step: Mutex::new(None),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_step(mut self) -> Self {
        self.fail_step = true;
        self
    }

    /// Share a log that step and render callbacks append `label:kind` to.
    pub fn logging(mut self, log: &Arc<Mutex<Vec<String>>>) -> Self {
        self.log = Some(log.clone());
        self
    }

    /// Init blocks until the returned sender fires.
    pub fn gated(self) -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        (tx, self)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn render_data_error_during_init(&self) -> Option<RegistryError> {
        self.render_error.lock().unwrap().clone()
    }

    pub fn last_step(&self) -> Option<(f64, f64)> {
        *self.last_step.lock().unwrap()
    }

    fn event(&self, name: &str) {
        self.events.lock().unwrap().push(name.to_string());
    }

    fn log(&self, kind: &str) {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(format!("{}:{kind}", self.label));
        }
    }
}

impl Entity for Tracker {
    fn name(&self) -> &str {
        &self.label
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn init(&self, ctx: LifecycleContext) -> LifecycleFuture<'_, EntityData> {
        Box::pin(async move {
            self.event("init");
            let render = ctx
                .game
                .registry()
                .with_render_data::<TrackerRender, _>(ctx.id, |_| ());
            *self.render_error.lock().unwrap() = render.err();

            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if self.fail_init {
                return Err(EntityError::other("init refused"));
            }
            Ok(entity_data(TrackerData { steps: 0 }))
        })
    }

    fn teardown(&self, _ctx: LifecycleContext) -> LifecycleFuture<'_, ()> {
        Box::pin(async move {
            self.event("teardown");
            Ok(())
        })
    }

    fn init_render_context(&self, ctx: RenderInitContext) -> LifecycleFuture<'_, EntityData> {
        Box::pin(async move {
            self.event("init_render");
            let node = ctx.render.stage.add_child(SceneNode::Container, 0.0);
            *self.node.lock().unwrap() = Some(node);
            Ok(entity_data(TrackerRender(7)))
        })
    }

    fn teardown_render_context(&self, ctx: RenderInitContext) -> LifecycleFuture<'_, ()> {
        Box::pin(async move {
            self.event("teardown_render");
            if let Some(node) = self.node.lock().unwrap().take() {
                ctx.render.stage.remove_child(node);
            }
            Ok(())
        })
    }

    fn physics_step(&self) -> Option<&dyn PhysicsStep> {
        Some(self)
    }

    fn render_frame(&self) -> Option<&dyn RenderFrame> {
        Some(self)
    }
}

impl PhysicsStep for Tracker {
    fn on_physics_step(&self, ctx: &StepContext<'_>) -> Result<(), EntityError> {
        ctx.with_data::<TrackerData, _>(|d| d.steps += 1)?;
        *self.last_step.lock().unwrap() = Some((ctx.delta, ctx.time));
        self.log("step");
        if self.fail_step {
            return Err(EntityError::other("step refused"));
        }
        Ok(())
    }
}

impl RenderFrame for Tracker {
    fn on_render_frame(&self, _ctx: &FrameContext<'_>) -> Result<(), EntityError> {
        self.log("render");
        Ok(())
    }
}

// -- TestSolid ----------------------------------------------------------------

#[derive(Deserialize)]
struct SolidArgs {
    width: f32,
    height: f32,
}

/// A static box spawned from a definition.
pub struct TestSolid {
    uid: String,
    preview: bool,
    position: Vec2,
    size: Vec2,
    body: Mutex<Option<BodyHandle>>,
    seen_in_teardown: Mutex<Option<bool>>,
    moves: AtomicUsize,
}

impl TestSolid {
    fn build(ctx: SpawnableContext) -> Result<Arc<dyn Entity>, ValidationError> {
        let args: SolidArgs = ctx.args()?;
        Ok(Arc::new(Self {
            uid: ctx.uid,
            preview: ctx.preview,
            position: ctx.transform.position,
            size: Vec2::new(args.width, args.height),
            body: Mutex::new(None),
            seen_in_teardown: Mutex::new(None),
            moves: AtomicUsize::new(0),
        }))
    }

    /// Whether `lookup(uid)` still found this entity while it was torn down.
    pub fn lookup_during_teardown(&self) -> Option<bool> {
        *self.seen_in_teardown.lock().unwrap()
    }

    pub fn moves(&self) -> usize {
        self.moves.load(Ordering::Relaxed)
    }
}

impl Entity for TestSolid {
    fn init(&self, ctx: LifecycleContext) -> LifecycleFuture<'_, EntityData> {
        Box::pin(async move {
            if !self.preview {
                let handle = ctx
                    .physics
                    .register(ctx.id, Body::fixed(self.position, self.size));
                *self.body.lock().unwrap() = Some(handle);
            }
            Ok(entity_data(()))
        })
    }

    fn teardown(&self, ctx: LifecycleContext) -> LifecycleFuture<'_, ()> {
        Box::pin(async move {
            *self.seen_in_teardown.lock().unwrap() = Some(ctx.game.lookup(&self.uid).is_some());
            Ok(())
        })
    }

    fn spawnable(&self) -> Option<&dyn Spawnable> {
        Some(self)
    }
}

impl Spawnable for TestSolid {
    fn on_transform(&self, game: &Game, spawned: &SpawnedEntity) -> Result<(), EntityError> {
        self.moves.fetch_add(1, Ordering::Relaxed);
        let body = *self.body.lock().unwrap();
        if let Some(body) = body {
            let position = spawned.transform().position;
            game.physics().with_body(body, |b| b.position = position)?;
        }
        Ok(())
    }
}

/// A headless game with `solid` registered.
pub fn test_game() -> Game {
    let game = Game::new(GameConfig::default()).unwrap();
    let schema = ArgsSchema::new()
        .field("width", FieldType::Number)
        .field("height", FieldType::Number);
    game.register_spawnable_with_schema("solid", schema, TestSolid::build)
        .unwrap();
    game
}

/// A 2x2 solid definition centred on `(x, y)`.
pub fn solid_def(uid: &str, x: f32, y: f32, tags: &[&str]) -> Value {
    json!({
        "entity": "solid",
        "uid": uid,
        "transform": {
            "position": { "x": x, "y": y },
            "rotation": 0.0,
            "zIndex": 0.0,
        },
        "tags": tags,
        "args": { "width": 2, "height": 2 },
    })
}
