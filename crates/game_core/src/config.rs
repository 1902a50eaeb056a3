//! Game configuration.

use std::time::Duration;

use game_math::Vec2;

use crate::error::GameError;
use crate::scheduler::tick_period;

/// Configuration for a [`Game`](crate::Game).
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    /// Fixed physics ticks per second.
    pub physics_tickrate: f64,
    /// A frame needing more fixed ticks than this logs a warning.
    pub catch_up_warn_ticks: u32,
    /// Gravity for the built-in physics world, units per second squared.
    pub gravity: Vec2,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            physics_tickrate: 60.0,
            catch_up_warn_ticks: 30,
            gravity: Vec2::ZERO,
        }
    }
}

impl GameConfig {
    #[must_use]
    pub fn with_tickrate(mut self, tickrate: f64) -> Self {
        self.physics_tickrate = tickrate;
        self
    }

    #[must_use]
    pub fn with_catch_up_warn_ticks(mut self, ticks: u32) -> Self {
        self.catch_up_warn_ticks = ticks;
        self
    }

    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    /// Check that the tickrate yields a usable tick period.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidConfig`] if the tickrate is not a positive finite
    /// number, or its period rounds to zero or overflows.
    pub fn validate(&self) -> Result<(), GameError> {
        let rate = self.physics_tickrate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(GameError::InvalidConfig(format!(
                "physics tickrate must be a positive number, got {rate}"
            )));
        }
        let nanos = (1e9 / rate).floor();
        if nanos < 1.0 || nanos >= u64::MAX as f64 {
            return Err(GameError::InvalidConfig(format!(
                "physics tickrate {rate} gives an unusable tick period"
            )));
        }
        Ok(())
    }

    /// Length of one fixed physics tick.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        tick_period(self.physics_tickrate)
    }

    /// How often the headless driver runs a frame: twice per tick.
    #[must_use]
    pub fn headless_interval(&self) -> Duration {
        self.tick_period() / 2
    }
}
