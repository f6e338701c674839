//! Unified error types for the modem driver.
//!
//! A single `Error` enum that every subsystem converts into, so callers of
//! the public API handle one type.  All variants are `Copy`; nothing here
//! allocates.
//!
//! Protocol failures reported by the modem are *not* errors in this sense:
//! they land in the topic registries as `Error` slot states and are observed
//! through the state queries.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level driver error
// ---------------------------------------------------------------------------

/// Every fallible driver operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A subscribe / publish-topic registry operation was refused.
    Topic(TopicError),
    /// A publish request was refused.
    Publish(PublishError),
    /// The byte transport failed.  The transport's own error is logged at
    /// the point of failure.
    Transport,
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic(e) => write!(f, "topic: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Transport => write!(f, "transport failure"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Topic registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicError {
    /// Every slot of the registry is active.
    NoFreeSlot,
    /// Index is outside the registry capacity.
    InvalidIndex(usize),
    /// Unsubscribe requested for a slot that is not `Subscribed`.
    NotSubscribed,
    /// Unregister requested for a slot that is not `Registered`.
    NotRegistered,
    /// Topic name is empty or contains a quote or line terminator.
    InvalidName,
    /// Topic name does not fit in a single command line.
    NameTooLong,
}

impl fmt::Display for TopicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFreeSlot => write!(f, "no free slot"),
            Self::InvalidIndex(idx) => write!(f, "invalid index {idx}"),
            Self::NotSubscribed => write!(f, "topic not subscribed"),
            Self::NotRegistered => write!(f, "topic not registered"),
            Self::InvalidName => write!(f, "invalid topic name"),
            Self::NameTooLong => write!(f, "topic name too long"),
        }
    }
}

impl From<TopicError> for Error {
    fn from(e: TopicError) -> Self {
        Self::Topic(e)
    }
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// Target publish topic is not `Registered`.
    NotRegistered,
    /// A previous payload is still staged, waiting for the data prompt.
    InFlight,
    /// Payload exceeds the staging capacity (carries the offending length).
    PayloadTooLarge(usize),
    /// Zero-length payloads are not sent.
    EmptyPayload,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRegistered => write!(f, "topic not registered"),
            Self::InFlight => write!(f, "previous publish still in flight"),
            Self::PayloadTooLarge(len) => write!(f, "payload too large ({len} bytes)"),
            Self::EmptyPayload => write!(f, "empty payload"),
        }
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Driver-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
