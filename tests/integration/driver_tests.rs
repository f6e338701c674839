//! Integration tests for the ModemDriver pub/sub pipeline.
//!
//! Each test drives the full chain: API call → command bytes on the mock
//! UART → scripted modem reply → poll → registry state / handler delivery.

use std::cell::RefCell;
use std::rc::Rc;

use awsmodem::protocol::classify::SendStatus;
use awsmodem::{
    DriverConfig, Error, ModemDriver, PublishError, PublishState, SubscribeState, TopicError,
    TopicIndex,
};

use crate::mock_hw::{Captured, MockClock, MockTransport, capture};

type Driver = ModemDriver<MockTransport, MockClock>;

fn make_driver(config: DriverConfig) -> (Driver, MockClock) {
    let clock = MockClock::new();
    let driver = ModemDriver::new(MockTransport::new(), clock.clone(), config).unwrap();
    (driver, clock)
}

/// Install an unhandled-line recorder.
fn record_unhandled(driver: &mut Driver) -> Captured {
    let (handler, lines) = capture();
    driver.set_unhandled_handler(Some(handler));
    lines
}

fn reply(driver: &mut Driver, bytes: &[u8]) {
    driver.transport_mut().inject(bytes);
    driver.poll().unwrap();
}

/// Subscribe and acknowledge; returns the slot and its message sink.
fn subscribed(driver: &mut Driver, topic: &str) -> (TopicIndex, Captured) {
    let (handler, messages) = capture();
    let idx = driver.subscribe(topic, handler).unwrap();
    let ack = format!("OK\r\n+AWSSUBOPEN={idx},0\r\n");
    reply(driver, ack.as_bytes());
    assert_eq!(driver.subscribe_state(idx).unwrap(), SubscribeState::Subscribed);
    driver.transport_mut().take_tx();
    (idx, messages)
}

fn registered(driver: &mut Driver, topic: &str) -> TopicIndex {
    let idx = driver.register_publish_topic(topic).unwrap();
    let ack = format!("OK\r\n+AWSPUBOPEN={idx},0\r\n");
    reply(driver, ack.as_bytes());
    assert_eq!(driver.publish_state(idx).unwrap(), PublishState::Registered);
    driver.transport_mut().take_tx();
    idx
}

// ── Subscribe lifecycle ───────────────────────────────────────

#[test]
fn subscribe_writes_command_and_waits_for_ack() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let (handler, _) = capture();

    let idx = d.subscribe("dev/cmd", handler).unwrap();
    assert_eq!(idx.get(), 0);
    assert_eq!(d.transport_mut().take_tx(), "AT+AWSSUBOPEN=0,\"dev/cmd\"\r\n");
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::Subscribing);
    assert_eq!(d.pending_acks(), 1);

    reply(&mut d, b"OK\r\n");
    assert_eq!(d.pending_acks(), 0);
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::Subscribing);

    reply(&mut d, b"+AWSSUBOPEN=0,0\r\n");
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::Subscribed);
}

#[test]
fn slots_are_allocated_lowest_first() {
    let (mut d, _) = make_driver(DriverConfig::default());
    for expected in 0..8 {
        let (handler, _) = capture();
        assert_eq!(d.subscribe("t", handler).unwrap().get(), expected);
    }
    let (handler, _) = capture();
    assert_eq!(
        d.subscribe("t", handler),
        Err(Error::Topic(TopicError::NoFreeSlot))
    );
}

#[test]
fn already_open_counts_as_subscribed() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let (handler, _) = capture();
    let idx = d.subscribe("dev/cmd", handler).unwrap();
    reply(&mut d, b"OK\r\n+AWSSUBOPEN=0,-2\r\n");
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::Subscribed);
}

#[test]
fn open_failure_frees_the_slot_for_reuse() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let (handler, _) = capture();
    let idx = d.subscribe("dev/cmd", handler).unwrap();
    reply(&mut d, b"OK\r\n+AWSSUBOPEN=0,-1\r\n");
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::Error);

    let (handler, _) = capture();
    assert_eq!(d.subscribe("dev/other", handler).unwrap(), idx);
}

#[test]
fn unsubscribe_returns_slot_and_drops_handler() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let (idx, messages) = subscribed(&mut d, "dev/cmd");

    d.unsubscribe(idx).unwrap();
    assert_eq!(d.transport_mut().take_tx(), "AT+AWSSUBCLOSE=0\r\n");
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::Unsubscribing);

    reply(&mut d, b"OK\r\n+AWSSUBCLOSE=0,0\r\n");
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::NotInUse);

    reply(&mut d, b"+AWS:0,2\r\nhi");
    assert!(messages.borrow().is_empty(), "closed slot must not deliver");
}

#[test]
fn unsubscribe_requires_subscribed_slot() {
    let (mut d, _) = make_driver(DriverConfig::default());
    assert_eq!(
        d.unsubscribe(TopicIndex::new(0)),
        Err(Error::Topic(TopicError::NotSubscribed))
    );
    assert_eq!(
        d.unsubscribe(TopicIndex::new(8)),
        Err(Error::Topic(TopicError::InvalidIndex(8)))
    );
    assert!(d.transport_mut().take_tx().is_empty());
}

#[test]
fn invalid_topic_writes_nothing() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let (handler, _) = capture();
    assert_eq!(
        d.subscribe("bad\"topic", handler),
        Err(Error::Topic(TopicError::InvalidName))
    );
    assert!(d.transport_mut().take_tx().is_empty());
    assert_eq!(d.pending_acks(), 0);
    assert_eq!(
        d.subscribe_state(TopicIndex::new(0)).unwrap(),
        SubscribeState::NotInUse
    );
}

#[test]
fn transport_failure_leaves_slot_unused() {
    let (mut d, _) = make_driver(DriverConfig::default());
    d.transport_mut().broken = true;
    let (handler, _) = capture();
    assert_eq!(d.subscribe("dev/cmd", handler), Err(Error::Transport));
    assert_eq!(
        d.subscribe_state(TopicIndex::new(0)).unwrap(),
        SubscribeState::NotInUse
    );
    assert_eq!(d.pending_acks(), 0);
}

#[test]
fn stalled_transport_fails_the_request() {
    let (mut d, _) = make_driver(DriverConfig::default());
    d.transport_mut().stalled = true;
    let (handler, _) = capture();

    assert_eq!(d.subscribe("dev/cmd", handler), Err(Error::Transport));
    assert_eq!(d.register_publish_topic("dev/telemetry"), Err(Error::Transport));
    assert_eq!(d.pending_acks(), 0);
    assert_eq!(
        d.subscribe_state(TopicIndex::new(0)).unwrap(),
        SubscribeState::NotInUse
    );
    assert_eq!(
        d.publish_state(TopicIndex::new(0)).unwrap(),
        PublishState::NotInUse
    );
}

#[test]
fn freed_slots_are_reused_lowest_first() {
    let (mut d, _) = make_driver(DriverConfig::default());
    for _ in 0..8 {
        let (handler, _) = capture();
        d.subscribe("t", handler).unwrap();
    }
    for i in 0..8 {
        let code = if i == 5 { -1 } else { 0 };
        let ack = format!("OK\r\n+AWSSUBOPEN={i},{code}\r\n");
        reply(&mut d, ack.as_bytes());
    }
    assert_eq!(
        d.subscribe_state(TopicIndex::new(5)).unwrap(),
        SubscribeState::Error
    );

    d.unsubscribe(TopicIndex::new(2)).unwrap();
    reply(&mut d, b"OK\r\n+AWSSUBCLOSE=2,0\r\n");

    let (handler, _) = capture();
    assert_eq!(d.subscribe("t", handler).unwrap().get(), 2);
    let (handler, _) = capture();
    assert_eq!(d.subscribe("t", handler).unwrap().get(), 5);
    let (handler, _) = capture();
    assert_eq!(
        d.subscribe("t", handler),
        Err(Error::Topic(TopicError::NoFreeSlot))
    );
}

#[test]
fn close_error_code_still_frees_subscription() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let (idx, messages) = subscribed(&mut d, "dev/cmd");

    d.unsubscribe(idx).unwrap();
    reply(&mut d, b"OK\r\n+AWSSUBCLOSE=0,-1\r\n");
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::NotInUse);

    reply(&mut d, b"+AWS:0,2\r\nhi");
    assert!(messages.borrow().is_empty(), "handler dropped on close");
}

#[test]
fn close_error_code_still_frees_publish_topic() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let idx = registered(&mut d, "dev/telemetry");
    d.unregister_publish_topic(idx).unwrap();
    reply(&mut d, b"OK\r\n+AWSPUBCLOSE=0,-5\r\n");
    assert_eq!(d.publish_state(idx).unwrap(), PublishState::NotInUse);
}

#[test]
fn already_open_counts_as_registered() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let idx = d.register_publish_topic("dev/telemetry").unwrap();
    reply(&mut d, b"OK\r\n+AWSPUBOPEN=0,-2\r\n");
    assert_eq!(d.publish_state(idx).unwrap(), PublishState::Registered);
}

// ── Message delivery ──────────────────────────────────────────

#[test]
fn message_reaches_its_slot_handler() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let mut sinks = Vec::new();
    for topic in ["a", "b", "c", "d"] {
        sinks.push(subscribed(&mut d, topic).1);
    }

    reply(&mut d, b"+AWS:3,5\r\nhello");

    assert_eq!(*sinks[3].borrow(), [b"hello".to_vec()]);
    assert!(sinks[..3].iter().all(|s| s.borrow().is_empty()));
}

#[test]
fn payload_bytes_are_not_interpreted() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let unhandled = record_unhandled(&mut d);
    let (_, messages) = subscribed(&mut d, "dev/cmd");

    // Payload contains a line terminator, a prompt and an OK.
    reply(&mut d, b"+AWS:0,7\r\n>OK\r\n\r\n");

    assert_eq!(*messages.borrow(), [b">OK\r\n\r\n".to_vec()]);
    assert!(unhandled.borrow().is_empty());
}

#[test]
fn message_split_across_polls() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let (_, messages) = subscribed(&mut d, "dev/cmd");

    reply(&mut d, b"+AWS:0,6\r\nabc");
    assert!(messages.borrow().is_empty());
    reply(&mut d, b"def");
    assert_eq!(*messages.borrow(), [b"abcdef".to_vec()]);
}

#[test]
fn zero_length_message_delivers_empty_payload() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let (_, messages) = subscribed(&mut d, "dev/cmd");
    reply(&mut d, b"+AWS:0,0\r\n");
    assert_eq!(*messages.borrow(), [Vec::<u8>::new()]);
}

#[test]
fn out_of_range_headers_are_forwarded() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let unhandled = record_unhandled(&mut d);

    reply(&mut d, b"+AWS:8,3\r\n");
    reply(&mut d, b"+AWS:0,101\r\n");

    assert_eq!(
        *unhandled.borrow(),
        [b"+AWS:8,3\r\n".to_vec(), b"+AWS:0,101\r\n".to_vec()]
    );
}

// ── Acknowledgement filtering ─────────────────────────────────

#[test]
fn driver_confirmations_are_hidden_from_application() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let unhandled = record_unhandled(&mut d);

    for topic in ["a", "b", "c"] {
        let (handler, _) = capture();
        d.subscribe(topic, handler).unwrap();
    }
    assert_eq!(d.pending_acks(), 3);

    reply(&mut d, b"\r\nOK\r\n\r\nOK\r\n\r\nERROR\r\n");
    assert!(unhandled.borrow().is_empty());
    assert_eq!(d.pending_acks(), 0);

    reply(&mut d, b"OK\r\n");
    assert_eq!(*unhandled.borrow(), [b"OK\r\n".to_vec()]);
}

#[test]
fn application_commands_get_their_replies() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let unhandled = record_unhandled(&mut d);

    d.send_at("AT+CSQ\r\n").unwrap();
    assert_eq!(d.transport_mut().take_tx(), "AT+CSQ\r\n");

    reply(&mut d, b"+CSQ: 20,99\r\nOK\r\n");
    assert_eq!(
        *unhandled.borrow(),
        [b"+CSQ: 20,99\r\n".to_vec(), b"OK\r\n".to_vec()]
    );
}

#[test]
fn disabled_filter_forwards_every_confirmation() {
    let config = DriverConfig {
        filter_acks: false,
        ..DriverConfig::default()
    };
    let (mut d, _) = make_driver(config);
    let unhandled = record_unhandled(&mut d);
    let (handler, _) = capture();
    d.subscribe("dev/cmd", handler).unwrap();

    reply(&mut d, b"OK\r\n");
    assert_eq!(*unhandled.borrow(), [b"OK\r\n".to_vec()]);
}

#[test]
fn stray_open_ack_is_ignored() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let unhandled = record_unhandled(&mut d);
    reply(&mut d, b"+AWSSUBOPEN=2,0\r\n");
    assert_eq!(
        d.subscribe_state(TopicIndex::new(2)).unwrap(),
        SubscribeState::NotInUse
    );
    assert!(unhandled.borrow().is_empty(), "well-formed acks are consumed");
}

// ── Publishing ────────────────────────────────────────────────

#[test]
fn publish_waits_for_prompt() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let idx = registered(&mut d, "dev/telemetry");

    d.publish(idx, b"{\"t\":21}").unwrap();
    assert_eq!(d.transport_mut().take_tx(), "AT+AWSPUBLISH=0,8\r\n");
    assert!(!d.pubdone());

    reply(&mut d, b"OK\r\n>");
    assert_eq!(d.transport_mut().take_tx(), "{\"t\":21}");
    assert!(d.pubdone());

    reply(&mut d, b"\r\nSEND OK\r\n");
    assert_eq!(d.last_send_status(), Some(SendStatus::Ok));
}

#[test]
fn send_failure_is_reported() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let idx = registered(&mut d, "dev/telemetry");
    d.publish(idx, b"x").unwrap();
    reply(&mut d, b"OK\r\n>");
    reply(&mut d, b"SEND FAIL\r\n");
    assert_eq!(d.last_send_status(), Some(SendStatus::Failed));
}

#[test]
fn publish_rejections() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let unregistered = TopicIndex::new(5);
    assert_eq!(
        d.publish(unregistered, b"x"),
        Err(Error::Publish(PublishError::NotRegistered))
    );

    let idx = registered(&mut d, "dev/telemetry");
    assert_eq!(
        d.publish(idx, b""),
        Err(Error::Publish(PublishError::EmptyPayload))
    );
    assert_eq!(
        d.publish(idx, &[0u8; 129]),
        Err(Error::Publish(PublishError::PayloadTooLarge(129)))
    );
    assert!(d.transport_mut().take_tx().is_empty());

    d.publish(idx, &[0u8; 128]).unwrap();
    assert_eq!(
        d.publish(idx, b"again"),
        Err(Error::Publish(PublishError::InFlight))
    );
}

#[test]
fn failed_payload_write_keeps_payload_and_input() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let pub_idx = registered(&mut d, "dev/telemetry");
    let (handler, _) = capture();
    let sub_idx = d.subscribe("dev/cmd", handler).unwrap();
    d.publish(pub_idx, b"abc").unwrap();
    d.transport_mut().take_tx();

    d.transport_mut().broken = true;
    d.transport_mut().inject(b"OK\r\n>+AWSSUBOPEN=0,0\r\n");
    assert_eq!(d.poll(), Err(Error::Transport));
    assert!(!d.pubdone(), "payload stays staged");
    assert_eq!(
        d.subscribe_state(sub_idx).unwrap(),
        SubscribeState::Subscribed,
        "bytes after the failed write are still processed"
    );

    // The modem is still waiting for the payload.
    d.transport_mut().broken = false;
    d.poll().unwrap();
    assert_eq!(d.transport_mut().take_tx(), "abc");
    assert!(d.pubdone());

    d.poll().unwrap();
    assert!(d.transport_mut().take_tx().is_empty(), "written exactly once");
}

#[test]
fn prompt_without_staged_payload_writes_nothing() {
    let (mut d, _) = make_driver(DriverConfig::default());
    reply(&mut d, b">");
    assert!(d.transport_mut().take_tx().is_empty());
}

#[test]
fn unregister_lifecycle() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let idx = registered(&mut d, "dev/telemetry");
    d.unregister_publish_topic(idx).unwrap();
    assert_eq!(d.transport_mut().take_tx(), "AT+AWSPUBCLOSE=0\r\n");
    assert_eq!(d.publish_state(idx).unwrap(), PublishState::Unregistering);
    reply(&mut d, b"OK\r\n+AWSPUBCLOSE=0,0\r\n");
    assert_eq!(d.publish_state(idx).unwrap(), PublishState::NotInUse);
    assert_eq!(
        d.unregister_publish_topic(idx),
        Err(Error::Topic(TopicError::NotRegistered))
    );
}

// ── Receive buffer ────────────────────────────────────────────

#[test]
fn overlong_line_is_discarded() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let unhandled = record_unhandled(&mut d);

    reply(&mut d, &[b'x'; 100]);
    reply(&mut d, b"+CSQ: 1\r\n");

    assert_eq!(*unhandled.borrow(), [b"+CSQ: 1\r\n".to_vec()]);
}

// ── Timeout policy ────────────────────────────────────────────

#[test]
fn unanswered_request_times_out() {
    let (mut d, clock) = make_driver(DriverConfig::with_timeouts());
    let (handler, _) = capture();
    let idx = d.subscribe("dev/cmd", handler).unwrap();

    clock.advance(2999);
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::Subscribing);
    clock.advance(1);
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::Error);

    // A late acknowledgement no longer applies.
    reply(&mut d, b"+AWSSUBOPEN=0,0\r\n");
    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::Error);
}

#[test]
fn without_policy_requests_wait_forever() {
    let (mut d, clock) = make_driver(DriverConfig::default());
    let idx = d.register_publish_topic("dev/telemetry").unwrap();
    clock.advance(60_000);
    assert_eq!(d.publish_state(idx).unwrap(), PublishState::Registering);
}

// ── Reset ─────────────────────────────────────────────────────

#[test]
fn reset_returns_to_initial_state() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let (idx, messages) = subscribed(&mut d, "dev/cmd");
    let pub_idx = registered(&mut d, "dev/telemetry");
    d.publish(pub_idx, b"x").unwrap();
    reply(&mut d, b"+AWS:0,4\r\nab");

    d.reset();

    assert_eq!(d.subscribe_state(idx).unwrap(), SubscribeState::NotInUse);
    assert_eq!(d.publish_state(pub_idx).unwrap(), PublishState::NotInUse);
    assert!(d.pubdone());
    assert_eq!(d.pending_acks(), 0);
    assert!(messages.borrow().is_empty());
}

#[test]
fn handler_may_capture_shared_state() {
    let (mut d, _) = make_driver(DriverConfig::default());
    let count = Rc::new(RefCell::new(0usize));
    let counter = Rc::clone(&count);
    d.subscribe("dev/cmd", Box::new(move |_: &[u8]| *counter.borrow_mut() += 1))
        .unwrap();
    reply(&mut d, b"OK\r\n+AWSSUBOPEN=0,0\r\n");
    reply(&mut d, b"+AWS:0,1\r\na+AWS:0,1\r\nb");
    assert_eq!(*count.borrow(), 2);
}
