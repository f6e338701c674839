//! Fuzz target: `ModemDriver::poll`
//!
//! Subscribes and registers a topic, stages a publish, then feeds an
//! arbitrary modem byte stream.  The driver must never panic and must
//! keep its acknowledgement count within what it issued.
//!
//! cargo fuzz run fuzz_driver_poll

#![no_main]

use std::collections::VecDeque;

use awsmodem::app::ports::{Clock, Transport};
use awsmodem::{DriverConfig, ModemDriver, TopicIndex};
use libfuzzer_sys::fuzz_target;

struct Stream(VecDeque<u8>);

impl Transport for Stream {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let n = buf.len().min(self.0.len());
        for (slot, byte) in buf.iter_mut().zip(self.0.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn available(&self) -> bool {
        !self.0.is_empty()
    }
}

struct Zero;

impl Clock for Zero {
    fn now_ms(&self) -> u32 {
        0
    }
}

fuzz_target!(|data: &[u8]| {
    let transport = Stream(VecDeque::new());
    let Ok(mut driver) =
        ModemDriver::<_, _, 4, 4>::new(transport, Zero, DriverConfig::with_timeouts())
    else {
        return;
    };
    driver.set_unhandled_handler(Some(Box::new(|_: &[u8]| {})));
    let _ = driver.subscribe("fuzz/in", Box::new(|payload: &[u8]| assert!(payload.len() <= 100)));
    let _ = driver.register_publish_topic("fuzz/out");

    driver.transport_mut().0.extend(data);
    let _ = driver.poll();
    assert!(driver.pending_acks() <= 2);

    let _ = driver.publish(TopicIndex::new(0), b"payload");
    driver.transport_mut().0.extend(data);
    let _ = driver.poll();
    assert!(driver.pending_acks() <= 3);
});
