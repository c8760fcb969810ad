//! Fixed-cadence playback clock.
//!
//! The clock only decides when ticks are due. It does not care how long a
//! render takes; late polls report every tick that was missed.

use std::time::{Duration, Instant};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(40);

#[derive(Debug, Clone)]
pub struct FrameClock {
    interval: Duration,
    next_tick: Instant,
}

impl FrameClock {
    pub fn new(interval: Duration, now: Instant) -> Self {
        // A zero interval would report unbounded ticks.
        let interval = interval.max(Duration::from_millis(1));
        Self {
            interval,
            next_tick: now + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks that came due up to `now`.
    pub fn poll(&mut self, now: Instant) -> u32 {
        let mut due = 0;
        while self.next_tick <= now {
            due += 1;
            self.next_tick += self.interval;
        }
        due
    }

    /// Time left until the next tick, zero if one is already due.
    pub fn until_next(&self, now: Instant) -> Duration {
        self.next_tick.saturating_duration_since(now)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL, Instant::now())
    }
}
