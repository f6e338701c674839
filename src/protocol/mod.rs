//! Modem stream protocol.
//!
//! ```text
//! ┌────────────┐ bytes ┌───────────────┐ Frame::Line ┌────────────┐ Response ┌───────────────┐
//! │ Transport  │──────▶│ FrameReceiver │────────────▶│ classify() │─────────▶│ AckCorrelator │
//! └────────────┘       └───────┬───────┘             └────────────┘          │ / registries  │
//!                              │ Frame::Payload / Frame::Prompt              └───────────────┘
//!                              ▼
//!                    subscribe handler / staged publish
//! ```

pub mod classify;
pub mod correlator;
pub mod receiver;
