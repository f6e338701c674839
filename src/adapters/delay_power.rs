//! Busy-wait power-down adapter.
//!
//! Implements [`PowerDown`] on top of any `embedded-hal` [`DelayNs`] for
//! parts without a usable low-power mode, and for host simulation.  Timed
//! steps block for their nominal duration; [`SleepStep::Forever`] polls
//! the [`WakeLatch`] every 16 ms until an interrupt handler signals it.

use embedded_hal::delay::DelayNs;
use log::trace;

use crate::app::ports::PowerDown;
use crate::events::WakeLatch;
use crate::power::SleepStep;

/// Polling period of an indefinite sleep.
const FOREVER_POLL_MS: u32 = 16;

pub struct DelayPowerDown<D: DelayNs> {
    delay: D,
    latch: &'static WakeLatch,
}

impl<D: DelayNs> DelayPowerDown<D> {
    /// `latch` must be the one given to the
    /// [`SleepCoordinator`](crate::power::SleepCoordinator).
    pub fn new(delay: D, latch: &'static WakeLatch) -> Self {
        Self { delay, latch }
    }

    pub fn into_inner(self) -> D {
        self.delay
    }
}

impl<D: DelayNs> PowerDown for DelayPowerDown<D> {
    fn power_down(&mut self, step: SleepStep) {
        match step.duration_ms() {
            Some(ms) => {
                trace!("power down {} ms", ms);
                self.delay.delay_ms(ms);
            }
            None => {
                while self.latch.fired().is_none() {
                    self.delay.delay_ms(FOREVER_POLL_MS);
                }
            }
        }
    }
}
