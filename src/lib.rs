//! Pub/sub driver for `AT+AWS` cellular / Wi-Fi IoT modems.
//!
//! The host talks to the modem over a byte stream.  The driver subscribes
//! to and registers topics, publishes payloads through the modem's `>`
//! data prompt, dispatches incoming messages to per-topic handlers and
//! hides its own `OK` / `ERROR` confirmations from the application.  A
//! separate [`power::SleepCoordinator`] puts the host to sleep in bounded
//! steps until a timer or wake interrupt ends it.
//!
//! Platform code plugs in through the traits in [`app::ports`]; host-side
//! adapters live in [`adapters`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod events;
pub mod power;
pub mod protocol;
pub mod registry;

mod error;

pub use app::service::{MessageHandler, ModemDriver, ResponseHandler};
pub use config::DriverConfig;
pub use error::{Error, PublishError, Result, TopicError};
pub use power::{SleepCoordinator, WakeReason};
pub use registry::{PublishState, SubscribeState, TopicIndex};
