//! Fixed-timestep accumulator.
//!
//! Each wall-clock frame adds its elapsed time to an accumulator; every whole
//! period in the accumulator is one physics tick. What is left over after
//! catch-up is the `smooth` fraction handed to render callbacks. All
//! arithmetic is in integer nanoseconds so a 250 ms frame at 60 Hz is
//! exactly 15 ticks.

use std::time::{Duration, Instant};

/// The fixed tick length for `tickrate` ticks per second.
#[must_use]
pub fn tick_period(tickrate: f64) -> Duration {
    Duration::from_nanos((1e9 / tickrate).floor() as u64)
}

/// What one frame has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlan {
    /// Fixed ticks to run before rendering.
    pub ticks: u32,
    /// Wall time since the previous frame.
    pub elapsed: Duration,
    /// Accumulated time not consumed by a tick.
    pub leftover: Duration,
    /// Wall time since the scheduler started.
    pub time: Duration,
}

#[derive(Debug, Clone)]
pub struct FixedStep {
    period: Duration,
    accumulator: Duration,
    start: Instant,
    last_frame: Instant,
    total_ticks: u64,
}

impl FixedStep {
    /// Create a scheduler whose clock starts at `start`.
    #[must_use]
    pub fn new(tickrate: f64, start: Instant) -> Self {
        Self {
            period: tick_period(tickrate),
            accumulator: Duration::ZERO,
            start,
            last_frame: start,
            total_ticks: 0,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks handed out since start.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Account for the frame ending at `now`.
    pub fn advance(&mut self, now: Instant) -> FramePlan {
        let elapsed = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        self.accumulator += elapsed;

        let mut ticks = 0u32;
        while !self.period.is_zero() && self.accumulator >= self.period {
            self.accumulator -= self.period;
            ticks += 1;
        }
        self.total_ticks += u64::from(ticks);

        FramePlan {
            ticks,
            elapsed,
            leftover: self.accumulator,
            time: now.saturating_duration_since(self.start),
        }
    }
}
