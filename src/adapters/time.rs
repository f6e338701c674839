//! Host clock adapter.
//!
//! Implements [`Clock`] over `std::time::Instant` for host-side use and
//! simulation.  On a board, wrap the platform's millisecond tick instead.

use std::time::Instant;

use crate::app::ports::Clock;

/// Milliseconds since construction, truncated to `u32` (wraps after ~49
/// days, which the registries tolerate).
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}
