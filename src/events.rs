//! Interrupt-shared wake latch.
//!
//! Wake sources are produced by GPIO interrupt handlers and consumed by the
//! sleep coordinator between power-down steps:
//!
//! ```text
//! ┌──────────────┐                ┌──────────────┐     ┌──────────────────┐
//! │ Device IRQ   │──┐             │              │     │                  │
//! │ (modem wake) │  ├── signal ──▶│  WakeLatch   │────▶│ SleepCoordinator │
//! │ External IRQ │──┘             │  (AtomicU8)  │     │ (between steps)  │
//! └──────────────┘                └──────────────┘     └──────────────────┘
//! ```
//!
//! The latch is the only state an interrupt handler may touch.  It holds a
//! single cause; the first source to fire wins and later signals are
//! ignored until the coordinator clears it.

use core::sync::atomic::{AtomicU8, Ordering};

const NO_WAKE: u8 = 0;
const DEVICE_WAKE: u8 = 1;
const EXTERNAL_WAKE: u8 = 2;

/// Asynchronous wake sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WakeSource {
    /// The modem signalled the host (pending message, state change).
    Device = DEVICE_WAKE,
    /// An application-supplied extra interrupt line.
    External = EXTERNAL_WAKE,
}

/// Single-cause wake flag shared between interrupt handlers and the
/// cooperative main loop.
///
/// Declare one as a `static` and inject it into the
/// [`SleepCoordinator`](crate::power::SleepCoordinator):
///
/// ```
/// use awsmodem::events::WakeLatch;
/// static WAKE: WakeLatch = WakeLatch::new();
/// assert!(WAKE.fired().is_none());
/// ```
#[derive(Debug)]
pub struct WakeLatch {
    cause: AtomicU8,
}

impl Default for WakeLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeLatch {
    pub const fn new() -> Self {
        Self {
            cause: AtomicU8::new(NO_WAKE),
        }
    }

    /// Record `source` as the wake cause.
    /// Safe to call from interrupt context (single compare-exchange).
    /// Returns `false` if another source already fired.
    pub fn signal(&self, source: WakeSource) -> bool {
        self.cause
            .compare_exchange(NO_WAKE, source as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The source that fired, if any.
    pub fn fired(&self) -> Option<WakeSource> {
        source_from_u8(self.cause.load(Ordering::Acquire))
    }

    /// Reset to "nothing fired".  Main-loop side only.
    pub fn clear(&self) {
        self.cause.store(NO_WAKE, Ordering::Release);
    }
}

/// What an interrupt handler is given when a wake line is armed.
///
/// `Copy` and `'static` so it can be stashed wherever the platform keeps
/// its ISR context.
#[derive(Debug, Clone, Copy)]
pub struct WakeHandle {
    latch: &'static WakeLatch,
    source: WakeSource,
}

impl WakeHandle {
    pub fn new(latch: &'static WakeLatch, source: WakeSource) -> Self {
        Self { latch, source }
    }

    /// The source this handle reports.
    pub fn source(&self) -> WakeSource {
        self.source
    }

    /// Call from the interrupt handler.  Only records the cause: disarming
    /// a level-triggered line is the
    /// [`InterruptController`](crate::app::ports::InterruptController)
    /// adapter's job.
    pub fn fire(&self) -> bool {
        self.latch.signal(self.source)
    }
}

// ── Internal ──────────────────────────────────────────────────

fn source_from_u8(raw: u8) -> Option<WakeSource> {
    match raw {
        DEVICE_WAKE => Some(WakeSource::Device),
        EXTERNAL_WAKE => Some(WakeSource::External),
        _ => None,
    }
}
