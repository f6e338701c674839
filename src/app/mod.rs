//! Application core: the driver façade and the ports it talks through.
//!
//! The protocol rules live in [`crate::protocol`] and [`crate::registry`];
//! this module composes them into [`service::ModemDriver`].  All
//! interaction with the UART, timer and power controller happens through
//! the **port traits** in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod ports;
pub mod service;
