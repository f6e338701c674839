//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements  | Connects to                      |
//! |----------------|-------------|----------------------------------|
//! | `time`         | Clock       | `std::time::Instant`             |
//! | `delay_power`  | PowerDown   | any `embedded_hal` `DelayNs`     |
//!
//! `Transport` and `InterruptController` are board-specific and are
//! supplied by the application.

pub mod delay_power;
pub mod time;
