//! Fuzz target: `FrameReceiver::feed` + `classify`
//!
//! Drives arbitrary bytes through the receiver, classifies every line and
//! arms a capture for every message header, the way the driver does.
//! Asserts that no frame exceeds the receive buffer.
//!
//! cargo fuzz run fuzz_frame_receiver

#![no_main]

use awsmodem::protocol::classify::{Response, classify};
use awsmodem::protocol::receiver::{Frame, FrameReceiver};
use awsmodem::TopicIndex;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut rx = FrameReceiver::new();

    for &byte in data {
        match rx.feed(byte) {
            Some(Frame::Line(line)) => {
                assert!(line.len() <= FrameReceiver::capacity());
                if let Response::Message { index, len } = classify(&line) {
                    let target = TopicIndex::new((index % 8) as u8);
                    let _ = rx.begin_capture(target, len);
                }
            }
            Some(Frame::Payload { data, .. }) => {
                assert!(!data.is_empty() && data.len() <= FrameReceiver::capacity());
            }
            Some(Frame::Prompt) | None => {}
        }
    }

    // After a reset the receiver must accept bytes cleanly again.
    rx.reset();
    assert!(!rx.is_capturing());
    for &byte in data {
        let _ = rx.feed(byte);
    }
});
