//! Driver configuration parameters
//!
//! Runtime switches for the optional behaviours of the driver, plus the
//! compile-time capacities every buffer is sized from.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// --- Capacities ---

/// Default number of subscribe / publish topic slots.
pub const DEFAULT_TOPIC_SLOTS: usize = 8;
/// Receive line buffer capacity; also the largest binary payload accepted.
pub const RX_BUFFER_SIZE: usize = 100;
/// Outbound publish staging capacity.
pub const TX_STAGING_SIZE: usize = 128;
/// Longest encoded command line (prefix, index, quoted topic, CRLF).
pub const MAX_COMMAND_LEN: usize = 288;
/// Default wait for a sub/pub acknowledgement before the slot is errored.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u32 = 3000;

/// Acknowledgement deadlines for the timeout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTimeouts {
    /// Deadline for `SUBOPEN` / `SUBCLOSE` acknowledgements (ms).
    pub subscribe_ms: u32,
    /// Deadline for `PUBOPEN` / `PUBCLOSE` acknowledgements (ms).
    pub publish_ms: u32,
}

impl Default for ResponseTimeouts {
    fn default() -> Self {
        Self {
            subscribe_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            publish_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
        }
    }
}

/// Core driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Swallow the bare `OK` / `ERROR` replies owed to driver-issued
    /// commands so that only application AT traffic reaches the
    /// unhandled-response handler.
    pub filter_acks: bool,
    /// Timeout policy.  `None` disables it: transitional slots wait forever
    /// and `sleep` never refuses.
    pub response_timeouts: Option<ResponseTimeouts>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            filter_acks: true,
            response_timeouts: None,
        }
    }
}

impl DriverConfig {
    /// Default configuration with the timeout policy enabled.
    pub fn with_timeouts() -> Self {
        Self {
            response_timeouts: Some(ResponseTimeouts::default()),
            ..Self::default()
        }
    }

    /// Reject parameter combinations the driver cannot honour.
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.response_timeouts {
            if t.subscribe_ms == 0 {
                return Err(Error::Config("subscribe timeout must be non-zero"));
            }
            if t.publish_ms == 0 {
                return Err(Error::Config("publish timeout must be non-zero"));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            log::warn!("config parse failed: {}", e);
            Error::Config("malformed JSON")
        })?;
        config.validate()?;
        Ok(config)
    }
}
