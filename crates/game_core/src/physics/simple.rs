//! A minimal built-in physics world: AABB bodies with gravity and velocity
//! integration, no collision response.

use std::collections::BTreeMap;

use game_math::{Aabb, Vec2};

use super::body::{Body, BodyHandle};
use super::engine::PhysicsEngine;

/// Integrates dynamic bodies. Ordered by handle so queries are stable.
#[derive(Debug, Default)]
pub struct SimpleWorld {
    bodies: BTreeMap<BodyHandle, Body>,
    next_handle: u64,
    gravity: Vec2,
}

impl SimpleWorld {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Units per second squared applied to every dynamic body.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    #[must_use]
    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }
}

impl PhysicsEngine for SimpleWorld {
    fn step(&mut self, dt_ms: f64) {
        let dt = (dt_ms / 1000.0) as f32;
        for body in self.bodies.values_mut() {
            if body.is_static {
                continue;
            }
            body.velocity += self.gravity * dt;
            body.position += body.velocity * dt;
        }
    }

    fn add_body(&mut self, body: Body) -> BodyHandle {
        self.next_handle += 1;
        let handle = BodyHandle(self.next_handle);
        self.bodies.insert(handle, body);
        handle
    }

    fn remove_body(&mut self, handle: BodyHandle) -> Option<Body> {
        self.bodies.remove(&handle)
    }

    fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(&handle)
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(&handle)
    }

    fn query_region(&self, region: &Aabb) -> Vec<BodyHandle> {
        self.bodies
            .iter()
            .filter(|(_, body)| body.bounds().intersects(region))
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn query_point(&self, point: Vec2) -> Vec<BodyHandle> {
        self.bodies
            .iter()
            .filter(|(_, body)| body.bounds().contains_point(point))
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn clear(&mut self) {
        self.bodies.clear();
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}
