//! Outstanding-acknowledgement filter.
//!
//! Every driver-issued command that the modem answers with a bare `OK` or
//! `ERROR` adds one to the pending count.  While the count is non-zero,
//! those bare replies (and the blank lines the modem wraps them in) are
//! spoken for and withheld from the application.  Replies are consumed in
//! arrival order against the count; they are not matched to a particular
//! command.

use super::classify::Response;

#[derive(Debug)]
pub struct AckCorrelator {
    enabled: bool,
    pending: u16,
}

impl AckCorrelator {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled, pending: 0 }
    }

    /// A command expecting a bare confirmation was just written.
    pub fn expect(&mut self) {
        if self.enabled {
            self.pending = self.pending.saturating_add(1);
        }
    }

    /// Try to claim `response` for the driver.  Returns `true` if it was
    /// spoken for and must not reach the application.
    pub fn consume(&mut self, response: &Response) -> bool {
        if !self.enabled || self.pending == 0 {
            return false;
        }
        match response {
            Response::Confirmation(_) => {
                self.pending -= 1;
                true
            }
            Response::Blank => true,
            _ => false,
        }
    }

    pub fn pending(&self) -> u16 {
        self.pending
    }

    pub fn reset(&mut self) {
        self.pending = 0;
    }
}
