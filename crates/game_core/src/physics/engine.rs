use game_math::{Aabb, Vec2};

use super::body::{Body, BodyHandle};

/// The physics collaborator. Collision detection and solving live behind
/// this trait; the game only steps it and tracks which entity owns which
/// body.
pub trait PhysicsEngine: Send {
    /// Advance the world by `dt_ms` milliseconds.
    fn step(&mut self, dt_ms: f64);

    /// Insert a body and return its handle.
    fn add_body(&mut self, body: Body) -> BodyHandle;

    /// Remove a body. Returns it if it existed.
    fn remove_body(&mut self, handle: BodyHandle) -> Option<Body>;

    fn body(&self, handle: BodyHandle) -> Option<&Body>;

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body>;

    /// Bodies whose bounds overlap `region`.
    fn query_region(&self, region: &Aabb) -> Vec<BodyHandle>;

    /// Bodies whose bounds contain `point`.
    fn query_point(&self, point: Vec2) -> Vec<BodyHandle>;

    /// Remove every body.
    fn clear(&mut self);

    fn body_count(&self) -> usize;
}
