//! Sleep / wake coordination.
//!
//! The hardware power-down primitive only knows a handful of fixed
//! durations.  A requested sleep is approximated by walking a descending
//! ladder of those durations, checking the [`WakeLatch`] at every step
//! boundary:
//!
//! ```text
//!  requested ──▶ 8s ─▶ 4s ─▶ 2s ─▶ 1s ─▶ 500 ─▶ 250 ─▶ 125 ─▶ 64 ─▶ 32 ─▶ 16 ──▶ Timer
//!                 │     │     │     │     │      │      │      │     │     │
//!                 └─────┴─────┴─────┴─────┴──────┴──────┴──────┴─────┴─────┴──▶ Device / External
//!                              (latch fired: stop at the next boundary)
//! ```
//!
//! Once inside a single step there is no cancellation other than the
//! hardware waking the CPU itself.

use log::{debug, info};

use crate::app::ports::{InterruptController, PowerDown, WakeLine};
use crate::events::{WakeHandle, WakeLatch, WakeSource};

// ═══════════════════════════════════════════════════════════════
//  Ladder
// ═══════════════════════════════════════════════════════════════

/// One hardware power-down granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SleepStep {
    S8,
    S4,
    S2,
    S1,
    Ms500,
    Ms250,
    Ms125,
    Ms64,
    Ms32,
    Ms16,
    /// No timer; only an interrupt ends it.
    Forever,
}

impl SleepStep {
    /// Nominal duration in milliseconds.  `None` for [`SleepStep::Forever`].
    pub const fn duration_ms(self) -> Option<u32> {
        match self {
            Self::S8 => Some(8000),
            Self::S4 => Some(4000),
            Self::S2 => Some(2000),
            Self::S1 => Some(1000),
            Self::Ms500 => Some(500),
            Self::Ms250 => Some(250),
            Self::Ms125 => Some(125),
            Self::Ms64 => Some(64),
            Self::Ms32 => Some(32),
            Self::Ms16 => Some(16),
            Self::Forever => None,
        }
    }
}

/// Timed steps, longest first.
pub const LADDER: [SleepStep; 10] = [
    SleepStep::S8,
    SleepStep::S4,
    SleepStep::S2,
    SleepStep::S1,
    SleepStep::Ms500,
    SleepStep::Ms250,
    SleepStep::Ms125,
    SleepStep::Ms64,
    SleepStep::Ms32,
    SleepStep::Ms16,
];

/// Why the host woke up (or did not go to sleep).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// A pub/sub request is still awaiting its acknowledgement; sleeping now
    /// would miss it.
    TryAgainShortly,
    /// The ladder ran to completion.
    Timer,
    /// The modem's wake line fired.
    Device,
    /// The caller's extra wake line fired.
    External,
}

impl From<WakeSource> for WakeReason {
    fn from(source: WakeSource) -> Self {
        match source {
            WakeSource::Device => Self::Device,
            WakeSource::External => Self::External,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Coordinator
// ═══════════════════════════════════════════════════════════════

/// Runs bounded power-downs and reports the wake cause.
pub struct SleepCoordinator {
    latch: &'static WakeLatch,
    /// The modem's host-wake line, armed on every sleep when present.
    device_wake: Option<WakeLine>,
}

impl SleepCoordinator {
    pub fn new(latch: &'static WakeLatch, device_wake: Option<WakeLine>) -> Self {
        Self { latch, device_wake }
    }

    /// The configured modem wake line.
    pub fn device_wake(&self) -> Option<WakeLine> {
        self.device_wake
    }

    /// Sleep for roughly `duration_ms` (0 = until an interrupt), waking
    /// early on the device line or `extra_wake`.
    ///
    /// The `hw` parameter satisfies **both** [`PowerDown`] and
    /// [`InterruptController`], since on most parts they are the same
    /// peripheral block.
    pub fn sleep(
        &self,
        hw: &mut (impl PowerDown + InterruptController),
        duration_ms: u32,
        extra_wake: Option<WakeLine>,
    ) -> WakeReason {
        self.latch.clear();

        if let Some(line) = self.device_wake {
            hw.attach(line, WakeHandle::new(self.latch, WakeSource::Device));
        }
        if let Some(line) = extra_wake {
            hw.attach(line, WakeHandle::new(self.latch, WakeSource::External));
        }

        if duration_ms == 0 {
            if self.latch.fired().is_none() {
                debug!("sleep: indefinite");
                hw.power_down(SleepStep::Forever);
            }
        } else {
            let left = self.run_ladder(hw, duration_ms);
            debug!("sleep: slept {} of {} ms", duration_ms - left, duration_ms);
        }

        if let Some(line) = self.device_wake {
            hw.detach(line.irq);
        }
        if let Some(line) = extra_wake {
            hw.detach(line.irq);
        }

        let reason = self.latch.fired().map_or(WakeReason::Timer, WakeReason::from);
        // Stale causes would end the next sleep immediately.
        self.latch.clear();
        info!("sleep: woke ({:?})", reason);
        reason
    }

    // ── Internal ──────────────────────────────────────────────

    /// Walk the ladder; returns the unslept remainder.
    fn run_ladder(&self, hw: &mut impl PowerDown, mut remaining: u32) -> u32 {
        for step in LADDER {
            let Some(ms) = step.duration_ms() else {
                continue;
            };
            while remaining >= ms {
                if self.latch.fired().is_some() {
                    return remaining;
                }
                hw.power_down(step);
                remaining -= ms;
            }
        }
        remaining
    }
}
