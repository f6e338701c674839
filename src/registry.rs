//! Fixed-capacity topic registries.
//!
//! Both registries share one lifecycle, exposed under protocol-specific
//! names:
//!
//! ```text
//!            open cmd              ack ok / -2
//!  NotInUse ─────────▶ Opening ─────────────▶ Open
//!     ▲  ▲                │                    │ close cmd
//!     │  │      ack err / │ timeout            ▼
//!     │  │                ▼                 Closing
//!     │  └──────────── Failed ◀── timeout ─────┤
//!     │   (reclaimed by       │                 │
//!     │    the next open)     │                 │ close ack (any code)
//!     └───────────────────────┴─────────────────┘
//! ```
//!
//! | Phase   | Subscribe       | Publish         |
//! |---------|-----------------|-----------------|
//! | Idle    | `NotInUse`      | `NotInUse`      |
//! | Opening | `Subscribing`   | `Registering`   |
//! | Open    | `Subscribed`    | `Registered`    |
//! | Closing | `Unsubscribing` | `Unregistering` |
//! | Failed  | `Error`         | `Error`         |
//!
//! The slot index doubles as the topic identifier on the wire.

use core::fmt;

use log::{info, warn};

use crate::error::TopicError;

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Wire-level topic identifier.  Only meaningful together with the registry
/// it came from; every registry access re-validates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicIndex(u8);

impl TopicIndex {
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TopicIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Public state views
// ---------------------------------------------------------------------------

/// Subscribe topic state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeState {
    NotInUse,
    Subscribing,
    Subscribed,
    Unsubscribing,
    Error,
}

/// Publish topic state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    NotInUse,
    Registering,
    Registered,
    Unregistering,
    Error,
}

/// Registry-internal lifecycle shared by both topic kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Opening,
    Open,
    Closing,
    Failed,
}

impl Phase {
    /// Awaiting an acknowledgement.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }

    /// May be claimed by the next open request.
    pub fn is_available(self) -> bool {
        matches!(self, Self::Idle | Self::Failed)
    }
}

impl From<Phase> for SubscribeState {
    fn from(p: Phase) -> Self {
        match p {
            Phase::Idle => Self::NotInUse,
            Phase::Opening => Self::Subscribing,
            Phase::Open => Self::Subscribed,
            Phase::Closing => Self::Unsubscribing,
            Phase::Failed => Self::Error,
        }
    }
}

impl From<Phase> for PublishState {
    fn from(p: Phase) -> Self {
        match p {
            Phase::Idle => Self::NotInUse,
            Phase::Opening => Self::Registering,
            Phase::Open => Self::Registered,
            Phase::Closing => Self::Unregistering,
            Phase::Failed => Self::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

struct Slot<E> {
    phase: Phase,
    /// Clock reading when the outstanding request was written.
    requested_at: u32,
    /// Per-slot payload (the delivery handler for subscribe topics).
    extra: E,
}

/// Fixed-capacity registry of `N` slots.
///
/// `E` is reset to `E::default()` whenever a slot returns to `Idle`, and
/// left untouched by every other transition.
pub struct TopicTable<E, const N: usize> {
    /// Log label ("sub" / "pub").
    label: &'static str,
    slots: [Slot<E>; N],
}

impl<E: Default, const N: usize> TopicTable<E, N> {
    pub fn new(label: &'static str) -> Self {
        const { assert!(N <= u8::MAX as usize, "topic index must fit in a u8") };
        Self {
            label,
            slots: core::array::from_fn(|_| Slot {
                phase: Phase::Idle,
                requested_at: 0,
                extra: E::default(),
            }),
        }
    }

    /// Return every slot to `Idle`.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.phase = Phase::Idle;
            slot.requested_at = 0;
            slot.extra = E::default();
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Validate a raw wire index against this registry.
    pub fn index(&self, raw: usize) -> Option<TopicIndex> {
        (raw < N).then(|| TopicIndex(raw as u8))
    }

    /// Lowest slot that is `Idle` or `Failed`.
    pub fn first_available(&self) -> Option<TopicIndex> {
        self.slots
            .iter()
            .position(|s| s.phase.is_available())
            .map(|i| TopicIndex(i as u8))
    }

    pub fn phase(&self, idx: TopicIndex) -> Result<Phase, TopicError> {
        Ok(self.slot(idx)?.phase)
    }

    pub fn extra(&self, idx: TopicIndex) -> Result<&E, TopicError> {
        Ok(&self.slot(idx)?.extra)
    }

    pub fn extra_mut(&mut self, idx: TopicIndex) -> Result<&mut E, TopicError> {
        Ok(&mut self.slot_mut(idx)?.extra)
    }

    /// `Idle | Failed → Opening`.  The caller has already written the open
    /// command; `extra` replaces whatever the slot held.
    pub fn begin_open(&mut self, idx: TopicIndex, now_ms: u32, extra: E) -> Result<(), TopicError> {
        let label = self.label;
        let slot = self.slot_mut(idx)?;
        if !slot.phase.is_available() {
            return Err(TopicError::NoFreeSlot);
        }
        slot.phase = Phase::Opening;
        slot.requested_at = now_ms;
        slot.extra = extra;
        info!("{} {}: opening", label, idx);
        Ok(())
    }

    /// `Open → Closing`.  Returns `false` (and changes nothing) unless the
    /// slot is `Open`.
    pub fn begin_close(&mut self, idx: TopicIndex, now_ms: u32) -> bool {
        let label = self.label;
        match self.slot_mut(idx) {
            Ok(slot) if slot.phase == Phase::Open => {
                slot.phase = Phase::Closing;
                slot.requested_at = now_ms;
                info!("{} {}: closing", label, idx);
                true
            }
            _ => false,
        }
    }

    /// Apply an open acknowledgement.  Only an `Opening` slot moves; the
    /// return value says whether it did.
    pub fn complete_open(&mut self, idx: TopicIndex, success: bool) -> bool {
        let label = self.label;
        let Ok(slot) = self.slot_mut(idx) else {
            return false;
        };
        if slot.phase != Phase::Opening {
            warn!("{} {}: open ack in {:?}, ignored", label, idx, slot.phase);
            return false;
        }
        slot.phase = if success { Phase::Open } else { Phase::Failed };
        info!("{} {}: -> {:?}", label, idx, slot.phase);
        true
    }

    /// Apply a close acknowledgement.  Only a `Closing` slot moves.
    pub fn complete_close(&mut self, idx: TopicIndex) -> bool {
        let label = self.label;
        let Ok(slot) = self.slot_mut(idx) else {
            return false;
        };
        if slot.phase != Phase::Closing {
            warn!("{} {}: close ack in {:?}, ignored", label, idx, slot.phase);
            return false;
        }
        slot.phase = Phase::Idle;
        slot.extra = E::default();
        info!("{} {}: closed", label, idx);
        true
    }

    /// Force every transitional slot older than `timeout_ms` to `Failed`.
    /// Returns `true` while at least one request is still within its
    /// deadline.
    pub fn expire(&mut self, now_ms: u32, timeout_ms: u32) -> bool {
        let mut waiting = false;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.phase.is_transitional() {
                continue;
            }
            if now_ms.wrapping_sub(slot.requested_at) >= timeout_ms {
                warn!("{} {}: timed out in {:?}", self.label, i, slot.phase);
                slot.phase = Phase::Failed;
            } else {
                waiting = true;
            }
        }
        waiting
    }

    /// Any slot awaiting an acknowledgement.
    pub fn any_transitional(&self) -> bool {
        self.slots.iter().any(|s| s.phase.is_transitional())
    }

    // ── Internal ──────────────────────────────────────────────

    fn slot(&self, idx: TopicIndex) -> Result<&Slot<E>, TopicError> {
        self.slots
            .get(idx.get())
            .ok_or(TopicError::InvalidIndex(idx.get()))
    }

    fn slot_mut(&mut self, idx: TopicIndex) -> Result<&mut Slot<E>, TopicError> {
        self.slots
            .get_mut(idx.get())
            .ok_or(TopicError::InvalidIndex(idx.get()))
    }
}
