//! Modem driver — the hexagonal core.
//!
//! [`ModemDriver`] owns the topic registries, the frame receiver, the
//! acknowledgement correlator and the publish staging buffer.  It exposes
//! the pub/sub API; all I/O flows through the [`Transport`] and [`Clock`]
//! ports, making the whole driver testable against mock adapters.
//!
//! ```text
//!               ┌──────────────────────────────────────┐
//!  subscribe ──▶│              ModemDriver             │──▶ Transport (commands,
//!  publish   ──▶│  registries · receiver · correlator  │     staged payloads)
//!  poll      ──▶│  staging                             │
//!  sleep     ──▶│                                      │──▶ message handlers
//!               └──────────────────────────────────────┘──▶ unhandled handler
//! ```
//!
//! Everything is cooperative: the timeout policy is evaluated at the top
//! of every public call instead of on a timer.

use log::{debug, info, warn};

use crate::config::{DEFAULT_TOPIC_SLOTS, DriverConfig, TX_STAGING_SIZE};
use crate::error::{Error, PublishError, Result, TopicError};
use crate::power::{SleepCoordinator, WakeReason};
use crate::protocol::classify::{self, Response, SendStatus, TopicKind};
use crate::protocol::correlator::AckCorrelator;
use crate::protocol::receiver::{Frame, FrameReceiver};
use crate::registry::{Phase, PublishState, SubscribeState, TopicIndex, TopicTable};

use super::commands::ModemCommand;
use super::ports::{Clock, InterruptController, PowerDown, Transport, WakeLine};

/// Receives the raw bytes of every message delivered to a subscription.
pub type MessageHandler = Box<dyn FnMut(&[u8])>;

/// Receives modem lines the driver does not consume, exactly as received
/// (line terminator included), typically replies to application-issued AT
/// commands.
pub type ResponseHandler = Box<dyn FnMut(&[u8])>;

/// Bytes pulled from the transport per read call.
const READ_CHUNK: usize = 32;

// ───────────────────────────────────────────────────────────────
// ModemDriver
// ───────────────────────────────────────────────────────────────

/// Pub/sub driver for an `AT+AWS` modem.
///
/// `SUBS` / `PUBS` fix the registry capacities at build time.
pub struct ModemDriver<T, K, const SUBS: usize = DEFAULT_TOPIC_SLOTS, const PUBS: usize = DEFAULT_TOPIC_SLOTS>
where
    T: Transport,
    K: Clock,
{
    transport: T,
    clock: K,
    config: DriverConfig,
    subs: TopicTable<Option<MessageHandler>, SUBS>,
    pubs: TopicTable<(), PUBS>,
    receiver: FrameReceiver,
    acks: AckCorrelator,
    /// Publish payload waiting for the `>` prompt.  Cleared only once
    /// written.
    staged: Option<heapless::Vec<u8, TX_STAGING_SIZE>>,
    /// The modem prompted for the staged payload but writing it failed.
    prompted: bool,
    on_unhandled: Option<ResponseHandler>,
    last_send: Option<SendStatus>,
}

impl<T, K, const SUBS: usize, const PUBS: usize> ModemDriver<T, K, SUBS, PUBS>
where
    T: Transport,
    K: Clock,
{
    /// Construct the driver with every slot `NotInUse`.
    pub fn new(transport: T, clock: K, config: DriverConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "modem driver: {} sub / {} pub slots, ack filter {}, timeouts {:?}",
            SUBS, PUBS, config.filter_acks, config.response_timeouts
        );
        Ok(Self {
            transport,
            clock,
            config,
            subs: TopicTable::new("sub"),
            pubs: TopicTable::new("pub"),
            receiver: FrameReceiver::new(),
            acks: AckCorrelator::new(config.filter_acks),
            staged: None,
            prompted: false,
            on_unhandled: None,
            last_send: None,
        })
    }

    /// Install (or remove) the handler for lines the driver does not consume.
    pub fn set_unhandled_handler(&mut self, handler: Option<ResponseHandler>) {
        self.on_unhandled = handler;
    }

    /// Return to the just-constructed state: all slots `NotInUse`, handlers
    /// dropped, counters zeroed, staging and partial input discarded.
    pub fn reset(&mut self) {
        self.subs.reset();
        self.pubs.reset();
        self.receiver.reset();
        self.acks.reset();
        self.staged = None;
        self.prompted = false;
        self.last_send = None;
        info!("modem driver: reset");
    }

    // ── Subscribe topics ──────────────────────────────────────

    /// Subscribe to `topic` on the lowest free slot.  `handler` receives
    /// every message delivered to it.
    pub fn subscribe(&mut self, topic: &str, handler: MessageHandler) -> Result<TopicIndex> {
        self.check_timeouts();
        let index = self.subs.first_available().ok_or(TopicError::NoFreeSlot)?;
        self.send(&ModemCommand::SubscribeOpen { index, topic })?;
        let now = self.clock.now_ms();
        self.subs.begin_open(index, now, Some(handler))?;
        Ok(index)
    }

    /// Unsubscribe a `Subscribed` slot.
    pub fn unsubscribe(&mut self, index: TopicIndex) -> Result<()> {
        self.check_timeouts();
        if self.subs.phase(index)? != Phase::Open {
            return Err(TopicError::NotSubscribed.into());
        }
        self.send(&ModemCommand::SubscribeClose { index })?;
        let now = self.clock.now_ms();
        self.subs.begin_close(index, now);
        Ok(())
    }

    /// Current state of subscribe slot `index`.
    pub fn subscribe_state(&mut self, index: TopicIndex) -> Result<SubscribeState> {
        self.check_timeouts();
        Ok(self.subs.phase(index)?.into())
    }

    // ── Publish topics ────────────────────────────────────────

    /// Register `topic` for publishing on the lowest free slot.
    pub fn register_publish_topic(&mut self, topic: &str) -> Result<TopicIndex> {
        self.check_timeouts();
        let index = self.pubs.first_available().ok_or(TopicError::NoFreeSlot)?;
        self.send(&ModemCommand::PublishOpen { index, topic })?;
        let now = self.clock.now_ms();
        self.pubs.begin_open(index, now, ())?;
        Ok(index)
    }

    /// Unregister a `Registered` publish topic.
    pub fn unregister_publish_topic(&mut self, index: TopicIndex) -> Result<()> {
        self.check_timeouts();
        if self.pubs.phase(index)? != Phase::Open {
            return Err(TopicError::NotRegistered.into());
        }
        self.send(&ModemCommand::PublishClose { index })?;
        let now = self.clock.now_ms();
        self.pubs.begin_close(index, now);
        Ok(())
    }

    /// Current state of publish slot `index`.
    pub fn publish_state(&mut self, index: TopicIndex) -> Result<PublishState> {
        self.check_timeouts();
        Ok(self.pubs.phase(index)?.into())
    }

    // ── Publish ───────────────────────────────────────────────

    /// Publish `payload` to a `Registered` topic.
    ///
    /// Only one payload can be in flight: poll until [`pubdone`](Self::pubdone)
    /// before publishing again.
    pub fn publish(&mut self, index: TopicIndex, payload: &[u8]) -> Result<()> {
        self.check_timeouts();
        if self.pubs.phase(index)? != Phase::Open {
            return Err(PublishError::NotRegistered.into());
        }
        if payload.is_empty() {
            return Err(PublishError::EmptyPayload.into());
        }
        let staged = heapless::Vec::from_slice(payload)
            .map_err(|()| PublishError::PayloadTooLarge(payload.len()))?;
        if self.staged.is_some() {
            return Err(PublishError::InFlight.into());
        }

        self.send(&ModemCommand::Publish {
            index,
            len: payload.len(),
        })?;
        self.staged = Some(staged);
        debug!("pub {}: staged {} bytes", index, payload.len());
        Ok(())
    }

    /// `true` once the last staged payload has been written to the modem.
    pub fn pubdone(&self) -> bool {
        self.staged.is_none()
    }

    /// Outcome of the most recent payload transmission reported by the modem.
    pub fn last_send_status(&self) -> Option<SendStatus> {
        self.last_send
    }

    // ── Raw AT pass-through ───────────────────────────────────

    /// Write an application AT command verbatim (include the CRLF).
    /// Its replies reach the unhandled-response handler unless they arrive
    /// while driver acknowledgements are still outstanding.
    pub fn send_at(&mut self, command: &str) -> Result<()> {
        self.check_timeouts();
        self.transport
            .write_all(command.as_bytes())
            .map_err(transport_error)
    }

    // ── Polling ───────────────────────────────────────────────

    /// Drain every byte the transport has and act on it.  Never blocks.
    ///
    /// A payload whose write failed after the `>` prompt is retried first.
    /// A write failure while processing input does not stop the input
    /// from being processed; the first such failure is returned at the end.
    pub fn poll(&mut self) -> Result<()> {
        self.check_timeouts();
        let mut first_err = None;
        if self.prompted {
            first_err = self.flush_staged().err();
        }
        let mut chunk = [0u8; READ_CHUNK];
        while self.transport.available() {
            let n = self.transport.read(&mut chunk).map_err(transport_error)?;
            if n == 0 {
                break;
            }
            for &byte in &chunk[..n] {
                if let Err(e) = self.on_byte(byte) {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    // ── Sleep ─────────────────────────────────────────────────

    /// Flush the transport and sleep through `coordinator`.
    ///
    /// With the timeout policy enabled, refuses with
    /// [`WakeReason::TryAgainShortly`] while a pub/sub request is still
    /// awaiting its acknowledgement.
    pub fn sleep(
        &mut self,
        coordinator: &SleepCoordinator,
        hw: &mut (impl PowerDown + InterruptController),
        duration_ms: u32,
        extra_wake: Option<WakeLine>,
    ) -> Result<WakeReason> {
        if self.check_timeouts() {
            info!("sleep refused: acknowledgement outstanding");
            return Ok(WakeReason::TryAgainShortly);
        }
        self.transport.flush().map_err(transport_error)?;
        Ok(coordinator.sleep(hw, duration_ms, extra_wake))
    }

    // ── Queries ───────────────────────────────────────────────

    /// Bare `OK` / `ERROR` replies still owed to driver commands.
    pub fn pending_acks(&self) -> u16 {
        self.acks.pending()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ── Internal ──────────────────────────────────────────────

    /// Apply the timeout policy.  Returns `true` while a request is still
    /// within its deadline; always `false` with the policy disabled.
    fn check_timeouts(&mut self) -> bool {
        let Some(t) = self.config.response_timeouts else {
            return false;
        };
        if !self.subs.any_transitional() && !self.pubs.any_transitional() {
            return false;
        }
        let now = self.clock.now_ms();
        let subs_waiting = self.subs.expire(now, t.subscribe_ms);
        let pubs_waiting = self.pubs.expire(now, t.publish_ms);
        subs_waiting || pubs_waiting
    }

    /// Encode and write one command that expects a bare confirmation.
    fn send(&mut self, cmd: &ModemCommand<'_>) -> Result<()> {
        let line = cmd.encode()?;
        self.transport
            .write_all(line.as_bytes())
            .map_err(transport_error)?;
        self.acks.expect();
        Ok(())
    }

    fn on_byte(&mut self, byte: u8) -> Result<()> {
        match self.receiver.feed(byte) {
            None => Ok(()),
            Some(Frame::Prompt) => {
                self.prompted = true;
                self.flush_staged()
            }
            Some(Frame::Line(line)) => {
                self.on_line(&line);
                Ok(())
            }
            Some(Frame::Payload { target, data }) => {
                self.deliver(target, &data);
                Ok(())
            }
        }
    }

    /// Write the staged payload after the modem's `>` prompt.  On failure
    /// the payload stays staged and is retried by the next `poll`.
    fn flush_staged(&mut self) -> Result<()> {
        let Some(payload) = &self.staged else {
            debug!("prompt with nothing staged");
            self.prompted = false;
            return Ok(());
        };
        self.transport.write_all(payload).map_err(transport_error)?;
        self.transport.flush().map_err(transport_error)?;
        debug!("wrote {} staged bytes", payload.len());
        self.staged = None;
        self.prompted = false;
        Ok(())
    }

    fn on_line(&mut self, line: &[u8]) {
        let response = classify::classify(line);
        let handled = match response {
            Response::Message { index, len } => self.begin_message(index, len),
            Response::Opened { kind, index, code } => self.on_opened(kind, index, code),
            Response::Closed { kind, index, code } => self.on_closed(kind, index, code),
            Response::SendResult(status) => {
                match status {
                    SendStatus::Ok => info!("publish: send ok"),
                    SendStatus::Failed => warn!("publish: send failed"),
                }
                self.last_send = Some(status);
                true
            }
            Response::Confirmation(_) | Response::Blank => self.acks.consume(&response),
            Response::Other => false,
        };
        if !handled {
            self.forward(line);
        }
    }

    /// `+AWS:<idx>,<len>`: arm a capture, or reject an out-of-range header.
    fn begin_message(&mut self, index: usize, len: usize) -> bool {
        let Some(target) = self.subs.index(index) else {
            warn!("message for sub {} outside registry", index);
            return false;
        };
        if len == 0 {
            self.deliver(target, &[]);
            return true;
        }
        if !self.receiver.begin_capture(target, len) {
            warn!("message of {} bytes for sub {} exceeds receive buffer", len, index);
            return false;
        }
        true
    }

    fn on_opened(&mut self, kind: TopicKind, index: usize, code: i32) -> bool {
        let success = Response::open_succeeded(code);
        if !success {
            warn!("{:?} open {} failed: err {}", kind, index, code);
        }
        match kind {
            TopicKind::Subscribe => match self.subs.index(index) {
                Some(idx) => {
                    self.subs.complete_open(idx, success);
                    true
                }
                None => false,
            },
            TopicKind::Publish => match self.pubs.index(index) {
                Some(idx) => {
                    self.pubs.complete_open(idx, success);
                    true
                }
                None => false,
            },
        }
    }

    /// Close is terminal whatever the modem's error code says.
    fn on_closed(&mut self, kind: TopicKind, index: usize, code: i32) -> bool {
        if code != 0 {
            debug!("{:?} close {} reported err {}", kind, index, code);
        }
        match kind {
            TopicKind::Subscribe => match self.subs.index(index) {
                Some(idx) => {
                    self.subs.complete_close(idx);
                    true
                }
                None => false,
            },
            TopicKind::Publish => match self.pubs.index(index) {
                Some(idx) => {
                    self.pubs.complete_close(idx);
                    true
                }
                None => false,
            },
        }
    }

    fn deliver(&mut self, target: TopicIndex, data: &[u8]) {
        match self.subs.extra_mut(target) {
            Ok(Some(handler)) => handler(data),
            _ => debug!("sub {}: no handler, dropped {} bytes", target, data.len()),
        }
    }

    fn forward(&mut self, line: &[u8]) {
        match &mut self.on_unhandled {
            Some(handler) => handler(line),
            None => debug!(
                "discarding {:?}",
                String::from_utf8_lossy(classify::trim_line_end(line))
            ),
        }
    }
}

fn transport_error(e: impl core::fmt::Debug) -> Error {
    warn!("transport error: {:?}", e);
    Error::Transport
}
