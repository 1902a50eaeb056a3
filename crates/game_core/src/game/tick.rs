//! The dual-rate loop: fixed physics ticks plus one render frame per wall
//! frame.

use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::Game;
use crate::context::{FrameContext, StepContext};
use crate::render::RenderContext;
use crate::scheduler::FramePlan;

/// Identifies a registered tick listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Called once per fixed tick with the tick length in milliseconds.
pub type TickListener = Arc<dyn Fn(f64) + Send + Sync>;

impl Game {
    /// Register a callback run every fixed tick, after the physics step and
    /// before entity callbacks.
    pub fn add_tick_listener(&self, listener: impl Fn(f64) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Takes effect from the next tick. Returns whether
    /// it was registered.
    pub fn remove_tick_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Run one frame ending now.
    pub fn frame(&self) -> FramePlan {
        self.frame_at(tokio::time::Instant::now().into_std())
    }

    /// Run one frame ending at `now`: every fixed tick the accumulator
    /// allows, then a render frame if a render context is present.
    pub fn frame_at(&self, now: Instant) -> FramePlan {
        let (plan, period, first_tick) = {
            let mut clock = self
                .inner
                .clock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let plan = clock.advance(now);
            (plan, clock.period(), clock.total_ticks() - u64::from(plan.ticks))
        };

        if plan.ticks > self.inner.config.catch_up_warn_ticks {
            warn!(
                ticks = plan.ticks,
                elapsed_ms = plan.elapsed.as_millis() as u64,
                budget_ticks = self.inner.config.catch_up_warn_ticks,
                "frame exceeded catch-up budget"
            );
        }

        for i in 0..u64::from(plan.ticks) {
            let time = period.as_secs_f64() * (first_tick + i + 1) as f64;
            self.physics_tick(period, time);
        }

        if let Some(render) = &self.inner.render {
            self.render_frame(render, &plan);
        }
        plan
    }

    fn physics_tick(&self, period: Duration, time: f64) {
        let dt_ms = period.as_nanos() as f64 / 1e6;
        self.inner.physics.step(dt_ms);

        let listeners: Vec<_> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(dt_ms);
        }

        let delta = period.as_secs_f64();
        for entry in self.entity_snapshot().iter() {
            let Some(step) = entry.entity.physics_step() else {
                continue;
            };
            let ctx = StepContext {
                game: self,
                id: entry.id,
                delta,
                time,
            };
            if let Err(e) = step.on_physics_step(&ctx) {
                error!(id = %entry.id, entity = entry.entity.name(), error = %e, "physics step failed");
            }
        }
    }

    fn render_frame(&self, render: &RenderContext, plan: &FramePlan) {
        for entry in self.entity_snapshot().iter() {
            let Some(frame) = entry.entity.render_frame() else {
                continue;
            };
            let ctx = FrameContext {
                game: self,
                render,
                id: entry.id,
                delta: plan.elapsed.as_secs_f64(),
                time: plan.time.as_secs_f64(),
                smooth: plan.leftover.as_secs_f64(),
            };
            if let Err(e) = frame.on_render_frame(&ctx) {
                error!(id = %entry.id, entity = entry.entity.name(), error = %e, "render frame failed");
            }
        }
    }

    /// Drive frames from a timer at twice the tick rate until
    /// [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        let mut stop = self.inner.stop.subscribe();
        if *stop.borrow() {
            return;
        }

        let mut interval = tokio::time::interval(self.inner.config.headless_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            tickrate = self.inner.config.physics_tickrate,
            interval_us = self.inner.config.headless_interval().as_micros() as u64,
            "game loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.frame();
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("game loop stopped");
    }
}
