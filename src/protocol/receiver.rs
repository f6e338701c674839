//! Byte-at-a-time frame receiver.
//!
//! The modem stream is mostly CRLF-terminated text, with two exceptions:
//!
//! ```text
//!  line mode      "+AWS:3,5\r\n"  "OK\r\n"  "SEND OK\r\n" ...
//!  prompt         '>'  (first byte of a line: modem wants publish bytes)
//!  capture mode   after "+AWS:<idx>,<len>": exactly <len> raw bytes,
//!                 no terminator, may contain '\n' or '>'
//! ```
//!
//! The receiver only frames; deciding what a line means, and when to
//! switch into capture mode, is the classifier's job.

use heapless::Vec;

use crate::config::RX_BUFFER_SIZE;
use crate::registry::TopicIndex;

/// Data-ready prompt byte.
pub const PROMPT: u8 = b'>';

/// Owned copy of a completed line or payload.
pub type FrameBuf = Vec<u8, RX_BUFFER_SIZE>;

/// A unit of modem output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line, terminator included.
    Line(FrameBuf),
    /// A complete binary capture for subscribe slot `target`.
    Payload { target: TopicIndex, data: FrameBuf },
    /// The modem is ready for the staged publish payload.
    Prompt,
}

/// In-flight binary capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Capture {
    target: TopicIndex,
    remaining: usize,
}

/// Streaming line / payload receiver.
pub struct FrameReceiver {
    buf: FrameBuf,
    capture: Option<Capture>,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReceiver {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            capture: None,
        }
    }

    /// Largest payload a capture can hold.
    pub const fn capacity() -> usize {
        RX_BUFFER_SIZE
    }

    /// Switch to capture mode: the next `len` bytes are a payload for
    /// `target`.  Refused (returns `false`) when `len` is zero, exceeds the
    /// buffer, or a capture is already running.
    pub fn begin_capture(&mut self, target: TopicIndex, len: usize) -> bool {
        if len == 0 || len > RX_BUFFER_SIZE || self.capture.is_some() {
            return false;
        }
        self.buf.clear();
        self.capture = Some(Capture {
            target,
            remaining: len,
        });
        true
    }

    /// A capture is in progress.
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Bytes accumulated for the current line or capture.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Feed one byte.  Returns a frame when one completes.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        if let Some(cap) = &mut self.capture {
            // begin_capture bounds `remaining` by the buffer capacity.
            let _ = self.buf.push(byte);
            cap.remaining -= 1;
            if cap.remaining == 0 {
                let target = cap.target;
                self.capture = None;
                let data = core::mem::take(&mut self.buf);
                return Some(Frame::Payload { target, data });
            }
            return None;
        }

        if self.buf.is_empty() && byte == PROMPT {
            return Some(Frame::Prompt);
        }

        // Never full here: a full buffer is cleared below before the next byte.
        let _ = self.buf.push(byte);

        if byte == b'\n' {
            return Some(Frame::Line(core::mem::take(&mut self.buf)));
        }

        if self.buf.is_full() {
            // Full without a terminator: drop everything collected so far.
            log::debug!("rx overflow, discarding {} bytes", self.buf.len());
            self.buf.clear();
        }
        None
    }

    /// Discard any partial line and abort a running capture.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.capture = None;
    }
}
