//! CBUS protocol engine.
//!
//! [`CbusNode`] owns the node identity, the enumeration round, the event
//! history and the long-message transport. Each call to [`CbusNode::process`]
//! is one bounded, non-blocking tick:
//!
//! 1. expire an open SLIM/FLIM negotiation,
//! 2. close an enumeration round whose window has elapsed,
//! 3. move frames from the CAN transport into the inbound queue,
//! 4. dispatch up to `max_messages` frames, alternating between the inbound
//!    queue and looped-back own frames,
//! 5. resume a paged `NERD` listing,
//! 6. emit due long-message fragments and reap stale exchanges and history.
//!
//! Protocol violations are answered on the wire (`CMDERR`, `WRACK`) and
//! logged; nothing in a tick returns an error.
use embassy_sync::blocking_mutex::raw::{NoopRawMutex, RawMutex};
use embassy_time::{Duration, Instant};

use crate::config::{HistoryConfig, LongMessageConfig, NodeConfig};
use crate::core::{NodeMode, Polarity, MAX_CAN_ID, MIN_CAN_ID};
use crate::error::{LongMessageError, NodeError};
use crate::infra::queue::{FrameQueue, QueueStats};
use crate::protocol::history::EventHistory;
use crate::protocol::managment::enumeration::{EnumerationOutcome, EnumerationRound};
use crate::protocol::managment::node_state::{NodeCounters, NodeState};
use crate::protocol::opcodes::{self, cmderr};
use crate::protocol::transport::can_frame::CbusFrame;
use crate::protocol::transport::can_id::CbusHeader;
use crate::protocol::transport::long_message::{LongMessage, LongMessageTransport};
use crate::protocol::transport::traits::{can_transport::CanTransport, config_store::ConfigStore};

mod dispatch;

/// Application callbacks. Every method has an empty default.
pub trait NodeHandler {
    /// A learned accessory event arrived; `index` is its record in the store.
    fn on_event(&mut self, _index: u8, _frame: &CbusFrame) {}
    /// Every frame taken from the inbound queue, before any filtering.
    fn on_raw_frame(&mut self, _frame: &CbusFrame) {}
    /// Standard frames accepted by `NodeConfig::frame_filter`.
    fn on_frame(&mut self, _frame: &CbusFrame) {}
    /// A long message finished, successfully or not.
    fn on_long_message(&mut self, _message: &LongMessage) {}
    /// Identity mode changed or was re-asserted.
    fn indicate_mode(&mut self, _mode: NodeMode) {}
    /// A frame was transmitted.
    fn indicate_activity(&mut self) {}
}

impl NodeHandler for () {}

/// Protocol engine bound to a transport `T`, a configuration store `S` and
/// application callbacks `H`. Frames arrive through `inbound`, which may also
/// be filled from interrupt context.
pub struct CbusNode<'a, T, S, H, M, const Q: usize>
where
    T: CanTransport,
    S: ConfigStore,
    H: NodeHandler,
    M: RawMutex,
{
    transport: T,
    store: S,
    handler: H,
    inbound: &'a FrameQueue<M, CbusFrame, Q>,
    /// Transmitted frames looped back when `consume_own_messages` is set.
    /// Same capacity and drop policy as `inbound`.
    own_messages: FrameQueue<NoopRawMutex, CbusFrame, Q>,
    /// Next event record to report for an unfinished `NERD`.
    nerd_cursor: Option<u8>,
    config: NodeConfig,
    state: NodeState,
    enumeration: Option<EnumerationRound>,
    history: EventHistory,
    long: LongMessageTransport,
}

impl<'a, T, S, H, M, const Q: usize> CbusNode<'a, T, S, H, M, Q>
where
    T: CanTransport,
    S: ConfigStore,
    H: NodeHandler,
    M: RawMutex,
{
    /// Build an engine whose identity is loaded from `store`.
    pub fn new(
        transport: T,
        store: S,
        handler: H,
        inbound: &'a FrameQueue<M, CbusFrame, Q>,
        config: NodeConfig,
    ) -> Self {
        let state = NodeState::load(&store);
        Self {
            transport,
            store,
            handler,
            inbound,
            own_messages: FrameQueue::new(),
            nerd_cursor: None,
            config,
            state,
            enumeration: None,
            history: EventHistory::default(),
            long: LongMessageTransport::default(),
        }
    }

    pub fn with_history_config(mut self, config: HistoryConfig) -> Self {
        self.history = EventHistory::new(config);
        self
    }

    pub fn with_long_message_config(mut self, config: LongMessageConfig) -> Self {
        self.long = LongMessageTransport::new(config);
        self
    }

    /// Start the transport and announce the loaded mode.
    pub fn begin(&mut self) -> Result<(), NodeError<T::Error>> {
        self.transport.begin().map_err(NodeError::Send)?;
        #[cfg(feature = "defmt")]
        defmt::info!(
            "CBUS node up: mode={}, can_id={}, node_number={}",
            self.state.mode,
            self.state.can_id,
            self.state.node_number
        );
        self.handler.indicate_mode(self.state.mode);
        Ok(())
    }

    //==================================================================================ACCESSORS
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn counters(&self) -> NodeCounters {
        self.state.counters
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut EventHistory {
        &mut self.history
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.inbound.stats()
    }

    /// Counters of the loopback queue used by `consume_own_messages`.
    pub fn loopback_stats(&self) -> QueueStats {
        self.own_messages.stats()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn is_enumerating(&self) -> bool {
        self.enumeration.is_some()
    }

    /// Long-message transmissions not yet fully sent.
    pub fn pending_long_messages(&self) -> usize {
        self.long.pending_transmits()
    }

    /// `true` while replies wait for transmit room (an unfinished `NERD`).
    pub fn has_paged_replies(&self) -> bool {
        self.nerd_cursor.is_some()
    }

    //==================================================================================TICK
    /// Run one processing tick. Returns the number of frames dispatched.
    pub fn process(&mut self, now: Instant) -> usize {
        if self
            .state
            .transition_expired(now, self.config.transition_timeout)
        {
            let mode = self.state.cancel_transition();
            #[cfg(feature = "defmt")]
            defmt::warn!("Mode transition timed out, back to {}", mode);
            self.handler.indicate_mode(mode);
        }

        self.service_enumeration(now);
        self.poll_transport();

        let mut handled = 0;
        let mut own_turn = false;
        while handled < self.config.max_messages {
            let Some((frame, own)) = self.next_frame(own_turn) else {
                break;
            };
            self.handle_frame(&frame, own, now);
            own_turn = !own;
            handled += 1;
        }

        self.service_nerd();

        for _ in 0..self.long.transmit_slots() {
            match self.long.poll_transmit(now) {
                Some(fragment) => self.send_reply(fragment),
                None => break,
            }
        }
        for message in self.long.reap(now) {
            self.handler.on_long_message(&message);
        }
        self.history.reap(now);

        handled
    }

    /// Move received frames from the transport into the inbound queue,
    /// at most one queue's worth per tick.
    fn poll_transport(&mut self) {
        for _ in 0..Q {
            if !self.transport.available() {
                break;
            }
            let Some(frame) = self.transport.get_next_message() else {
                break;
            };
            if self.inbound.enqueue(frame).is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("Inbound queue full, frame from can_id={} dropped", frame.can_id());
            }
        }
    }

    /// Take from the preferred queue, falling back to the other one.
    fn next_frame(&self, own_turn: bool) -> Option<(CbusFrame, bool)> {
        let own = || self.own_messages.dequeue().map(|frame| (frame, true));
        let inbound = || self.inbound.dequeue().map(|frame| (frame, false));
        if own_turn {
            own().or_else(inbound)
        } else {
            inbound().or_else(own)
        }
    }

    fn handle_frame(&mut self, frame: &CbusFrame, own: bool, now: Instant) {
        self.state.counters.received = self.state.counters.received.wrapping_add(1);
        self.history.add(frame, now);
        self.handler.on_raw_frame(frame);

        if !own && !frame.is_extended() {
            let remote_can_id = frame.can_id();
            match self.enumeration.as_mut() {
                Some(round) => round.record(remote_can_id),
                None if self.state.can_id != 0 && remote_can_id == self.state.can_id => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("CAN-ID clash on {}, enumerating", remote_can_id);
                    self.start_round(now, true);
                }
                None => {}
            }
        }

        if frame.is_extended() {
            return;
        }
        if self.config.frame_filter.matches(frame) {
            self.handler.on_frame(frame);
        }
        if frame.is_empty() {
            if frame.is_remote() && !own {
                self.answer_probe();
            }
            return;
        }
        self.dispatch(frame, now);
    }

    //==================================================================================ENUMERATION
    /// Probe the bus and pick a free CAN-ID once the window closes.
    /// Ignored while a round is already running.
    pub fn start_enumeration(&mut self, now: Instant) -> bool {
        let forced = !(MIN_CAN_ID..=MAX_CAN_ID).contains(&self.state.can_id);
        self.start_round(now, forced)
    }

    pub(crate) fn start_round(&mut self, now: Instant, forced: bool) -> bool {
        if self.enumeration.is_some() {
            return false;
        }
        self.enumeration = Some(EnumerationRound::new(now, forced));
        let probe = CbusFrame::enumeration_probe(self.local_header());
        self.send_reply(probe);
        #[cfg(feature = "defmt")]
        defmt::info!("Enumeration started (forced={})", forced);
        true
    }

    fn service_enumeration(&mut self, now: Instant) {
        let window = self.config.enumeration_window;
        let Some(round) = self.enumeration.take_if(|r| r.is_closed(now, window)) else {
            return;
        };
        match round.outcome() {
            EnumerationOutcome::NoResponses => {
                #[cfg(feature = "defmt")]
                defmt::info!("Enumeration: no responses, keeping can_id={}", self.state.can_id);
            }
            EnumerationOutcome::Selected(can_id) => {
                #[cfg(feature = "defmt")]
                defmt::info!("Enumeration selected can_id={}", can_id);
                self.state.can_id = can_id;
                self.store.set_can_id(can_id);
                let nn = self.nn_bytes();
                self.reply(opcodes::NNACK, &nn);
            }
            EnumerationOutcome::Exhausted => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Enumeration: every CAN-ID is taken");
                self.command_error(cmderr::INVALID_CAN_ID);
            }
        }
    }

    fn answer_probe(&mut self) {
        if self.state.can_id == 0 {
            return;
        }
        let response = CbusFrame::enumeration_response(self.local_header());
        self.send_reply(response);
    }

    fn local_header(&self) -> CbusHeader {
        CbusHeader(
            (((self.config.default_priority & 0x0F) as u16) << 7) | self.state.can_id as u16,
        )
    }

    //==================================================================================OPERATOR
    /// Open a negotiation for a node number (`RQNN`). The node answers `SNN`
    /// until the transition timeout.
    pub fn request_flim(&mut self, now: Instant) -> Result<(), NodeError<T::Error>> {
        if !self.state.begin_transition(now) {
            return Err(NodeError::InvalidMode);
        }
        self.handler.indicate_mode(self.state.mode);
        let nn = self.nn_bytes();
        self.send_cbus_message(CbusFrame::with_opcode(opcodes::RQNN, &nn))
    }

    /// Release the node number (`NNREL`) and return to SLIM.
    pub fn revert_slim(&mut self) -> Result<(), NodeError<T::Error>> {
        let nn = self.nn_bytes();
        let sent = self.send_cbus_message(CbusFrame::with_opcode(opcodes::NNREL, &nn));
        self.state.revert_to_slim();
        self.enumeration = None;
        self.store.set_mode(NodeMode::Slim);
        self.store.set_can_id(0);
        self.store.set_node_number(0);
        self.handler.indicate_mode(NodeMode::Slim);
        sent
    }

    /// Assign a CAN-ID locally and persist it.
    pub fn set_can_id(&mut self, can_id: u8) -> Result<(), NodeError<T::Error>> {
        if !(MIN_CAN_ID..=MAX_CAN_ID).contains(&can_id) {
            return Err(NodeError::InvalidCanId { can_id });
        }
        self.state.can_id = can_id;
        self.store.set_can_id(can_id);
        Ok(())
    }

    /// Produce a long accessory event from this node.
    pub fn send_event(
        &mut self,
        polarity: Polarity,
        event_number: u16,
    ) -> Result<(), NodeError<T::Error>> {
        let frame = CbusFrame::from_event(polarity, self.state.node_number, event_number);
        self.send_cbus_message(frame)
    }

    /// Send the header now; continuation fragments follow on later ticks.
    pub fn send_long_message(
        &mut self,
        payload: &[u8],
        stream_id: u8,
        now: Instant,
    ) -> Result<(), NodeError<T::Error>> {
        let header = self
            .long
            .send(payload, stream_id, self.config.default_priority, now)?;
        if let Err(err) = self.send_cbus_message(header) {
            // Without its header the continuation fragments are unmatched.
            self.long.abort(stream_id);
            return Err(err);
        }
        Ok(())
    }

    /// Accept long messages on `stream_ids`; results go to `NodeHandler::on_long_message`.
    pub fn subscribe_long_messages(
        &mut self,
        stream_ids: &[u8],
        receive_timeout: Duration,
    ) -> Result<(), LongMessageError> {
        self.long.subscribe(stream_ids, receive_timeout)
    }

    //==================================================================================SEND
    /// Transmit `frame`, stamping this node's CAN-ID when the frame has none.
    pub fn send_cbus_message(&mut self, mut frame: CbusFrame) -> Result<(), NodeError<T::Error>> {
        if !frame.is_extended() && frame.can_id() == 0 {
            let priority = match frame.priority() {
                0 => self.config.default_priority,
                priority => priority,
            };
            frame.make_header(self.state.can_id, priority);
        }

        self.transport.send_message(&frame).map_err(NodeError::Send)?;
        self.state.counters.sent = self.state.counters.sent.wrapping_add(1);
        self.handler.indicate_activity();

        if self.config.consume_own_messages
            && !frame.is_empty()
            && self.own_messages.enqueue(frame).is_err()
        {
            #[cfg(feature = "defmt")]
            defmt::warn!("Loopback queue full, own frame dropped");
        }
        Ok(())
    }

    /// Send from inside a tick: failures are counted and logged, never returned.
    fn send_reply(&mut self, frame: CbusFrame) {
        if let Err(_err) = self.send_cbus_message(frame) {
            self.state.counters.send_failures = self.state.counters.send_failures.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!("CBUS send failed: {}", defmt::Debug2Format(&_err));
        }
    }

    fn reply(&mut self, opcode: u8, args: &[u8]) {
        self.send_reply(CbusFrame::with_opcode(opcode, args));
    }

    fn command_error(&mut self, code: u8) {
        let [nh, nl] = self.nn_bytes();
        self.reply(opcodes::CMDERR, &[nh, nl, code]);
    }

    fn nn_bytes(&self) -> [u8; 2] {
        self.state.node_number.to_be_bytes()
    }
}
