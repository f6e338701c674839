//! Port traits — the hexagonal boundary between the protocol core and the
//! board it runs on.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ModemDriver / SleepCoordinator
//! ```
//!
//! Driven adapters (UART, timer, GPIO interrupt controller, power
//! controller) implement these traits.  The core consumes them via
//! generics, so it never touches hardware directly.

use crate::events::WakeHandle;
use crate::power::SleepStep;

// ───────────────────────────────────────────────────────────────
// Transport port (modem UART)
// ───────────────────────────────────────────────────────────────

/// Byte-oriented channel to the modem.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data` to the transport.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Check if data is available for reading.
    fn available(&self) -> bool;

    /// Write every byte of `data`, retrying short writes.
    ///
    /// A write that accepts zero bytes means the link has stalled; the
    /// remainder is not retried and [`WriteError::Stalled`] reports how
    /// much was still unwritten.
    fn write_all(&mut self, mut data: &[u8]) -> Result<(), WriteError<Self::Error>> {
        while !data.is_empty() {
            let n = self.write(data).map_err(WriteError::Transport)?;
            if n == 0 {
                return Err(WriteError::Stalled {
                    unwritten: data.len(),
                });
            }
            data = &data[n..];
        }
        Ok(())
    }
}

/// Failure of [`Transport::write_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError<E> {
    /// The transport's own write failed.
    Transport(E),
    /// The transport accepted zero bytes with `unwritten` bytes left.
    Stalled { unwritten: usize },
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.  Wraps at `u32::MAX`; consumers compare
/// with `wrapping_sub`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Interrupt port
// ───────────────────────────────────────────────────────────────

/// Platform interrupt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterruptId(pub u8);

/// Edge / level condition that fires an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Low,
    Change,
    Rising,
    Falling,
}

/// An interrupt line plus the condition that wakes the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeLine {
    pub irq: InterruptId,
    pub trigger: Trigger,
}

impl WakeLine {
    pub const fn new(irq: InterruptId, trigger: Trigger) -> Self {
        Self { irq, trigger }
    }
}

/// Attaches wake handlers to interrupt lines.
///
/// The handler installed by `attach` must do nothing beyond
/// [`WakeHandle::fire`] and disarming lines.  Any other driver state is off
/// limits from interrupt context.
///
/// A level-triggered line ([`Trigger::Low`]) keeps firing for as long as
/// the level holds.  Adapters must disarm every line armed for the sleep
/// inside the handler when such a line fires; the coordinator's own
/// `detach` calls only run after the CPU is back in the main loop.
pub trait InterruptController {
    /// Arm `line`; when it triggers, call `handle.fire()`.
    fn attach(&mut self, line: WakeLine, handle: WakeHandle);

    /// Disarm `irq`.  Must be idempotent: the coordinator detaches every
    /// line it armed even if the handler already did so.
    fn detach(&mut self, irq: InterruptId);
}

// ───────────────────────────────────────────────────────────────
// Power port
// ───────────────────────────────────────────────────────────────

/// Low-power hardware sleep primitive.
pub trait PowerDown {
    /// Power down for one ladder step.  Returns early if an armed interrupt
    /// wakes the CPU.  [`SleepStep::Forever`] returns only on an interrupt.
    fn power_down(&mut self, step: SleepStep);
}
