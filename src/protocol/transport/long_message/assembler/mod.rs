//! Receive side of the long-message transport: rebuilds payloads from
//! header and continuation fragments, keyed by `(stream id, sender CAN-ID)`.
use alloc::vec::Vec;
use embassy_time::{Duration, Instant};

use super::{
    crc::crc16, next_sequence, LongMessage, LongMessageStatus, FLAG_CRC_PRESENT,
};
use crate::config::{CrcPolicy, LongMessageConfig};
use crate::error::LongMessageError;
use crate::protocol::opcodes::DTXC;
use crate::protocol::transport::can_frame::CbusFrame;

//==================================================================================Enums and Structs
#[derive(Debug)]
pub enum ProcessResult {
    /// Not a long-message fragment, unsubscribed stream, or no matching exchange.
    Ignored,
    /// Fragment stored; more are expected.
    FragmentConsumed,
    /// Exchange finished, successfully or not.
    Delivered(LongMessage),
}

/// State of one inbound exchange.
#[derive(Debug, Clone)]
struct ReceiveContext {
    in_use: bool,
    stream_id: u8,
    peer_can_id: u8,
    buffer: Vec<u8>,
    declared_size: u16,
    crc: Option<u16>,
    expected_next_sequence: u8,
    last_activity: Instant,
}

impl ReceiveContext {
    const fn new() -> Self {
        Self {
            in_use: false,
            stream_id: 0,
            peer_can_id: 0,
            buffer: Vec::new(),
            declared_size: 0,
            crc: None,
            expected_next_sequence: 1,
            last_activity: Instant::from_ticks(0),
        }
    }

    /// Hand the accumulated bytes out and free the slot.
    fn finish(&mut self, status: LongMessageStatus) -> LongMessage {
        self.in_use = false;
        LongMessage {
            stream_id: self.stream_id,
            peer_can_id: self.peer_can_id,
            status,
            payload: core::mem::take(&mut self.buffer),
        }
    }
}

/// An accepted stream and its idle timeout.
#[derive(Debug, Clone, Copy)]
struct Subscription {
    stream_id: u8,
    receive_timeout: Duration,
}

/// Pool of receive contexts plus the subscription list.
#[derive(Debug)]
pub struct LongMessageAssembler {
    contexts: Vec<ReceiveContext>,
    subscriptions: Vec<Subscription>,
    config: LongMessageConfig,
}

impl LongMessageAssembler {
    pub fn new(config: LongMessageConfig) -> Self {
        let mut contexts = Vec::with_capacity(config.context_pool);
        contexts.resize(config.context_pool, ReceiveContext::new());
        Self {
            contexts,
            subscriptions: Vec::new(),
            config,
        }
    }

    /// Add `stream_ids` to the accepted set with their idle timeout.
    /// Streams already subscribed take the new timeout; others keep theirs.
    pub fn subscribe(
        &mut self,
        stream_ids: &[u8],
        receive_timeout: Duration,
    ) -> Result<(), LongMessageError> {
        if stream_ids.is_empty() {
            return Err(LongMessageError::EmptySubscription);
        }
        for &stream_id in stream_ids {
            match self.subscriptions.iter_mut().find(|s| s.stream_id == stream_id) {
                Some(subscription) => subscription.receive_timeout = receive_timeout,
                None => self.subscriptions.push(Subscription {
                    stream_id,
                    receive_timeout,
                }),
            }
        }
        Ok(())
    }

    pub fn is_subscribed(&self, stream_id: u8) -> bool {
        self.subscriptions.iter().any(|s| s.stream_id == stream_id)
    }

    /// Idle timeout of `stream_id`, the configured default when unsubscribed.
    pub fn receive_timeout(&self, stream_id: u8) -> Duration {
        timeout_for(&self.subscriptions, stream_id, self.config.receive_timeout)
    }

    /// Exchanges currently being received.
    pub fn active(&self) -> usize {
        self.contexts.iter().filter(|c| c.in_use).count()
    }

    //==================================================================================Process Functions
    /// Process a frame that may be a long-message fragment.
    pub fn process_frame(&mut self, frame: &CbusFrame, now: Instant) -> ProcessResult {
        if frame.opcode() != Some(DTXC) || frame.len < 3 {
            return ProcessResult::Ignored;
        }
        let stream_id = frame.data[1];
        if !self.is_subscribed(stream_id) {
            return ProcessResult::Ignored;
        }
        let peer_can_id = frame.can_id();

        if frame.data[2] == 0 {
            self.start_exchange(frame, stream_id, peer_can_id, now)
        } else {
            self.continue_exchange(frame, stream_id, peer_can_id, now)
        }
    }

    fn start_exchange(
        &mut self,
        frame: &CbusFrame,
        stream_id: u8,
        peer_can_id: u8,
        now: Instant,
    ) -> ProcessResult {
        if frame.len < 8 {
            return ProcessResult::Ignored;
        }

        // A new header from the same peer on the same stream restarts the exchange.
        let index = match self
            .contexts
            .iter()
            .position(|c| c.in_use && c.stream_id == stream_id && c.peer_can_id == peer_can_id)
            .or_else(|| self.contexts.iter().position(|c| !c.in_use))
        {
            Some(index) => index,
            None if self.config.allow_growth => {
                self.contexts.push(ReceiveContext::new());
                self.contexts.len() - 1
            }
            None => {
                #[cfg(feature = "defmt")]
                defmt::warn!("No free long-message receive context, stream={}", stream_id);
                return ProcessResult::Ignored;
            }
        };

        let declared_size = u16::from_be_bytes([frame.data[3], frame.data[4]]);
        let crc = if frame.data[7] & FLAG_CRC_PRESENT != 0 {
            Some(u16::from_be_bytes([frame.data[5], frame.data[6]]))
        } else {
            None
        };

        let context = &mut self.contexts[index];
        context.in_use = true;
        context.stream_id = stream_id;
        context.peer_can_id = peer_can_id;
        context.buffer.clear();
        context.buffer.reserve(declared_size as usize);
        context.declared_size = declared_size;
        context.crc = crc;
        context.expected_next_sequence = 1;
        context.last_activity = now;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Long message started: stream={}, peer={}, size={}",
            stream_id,
            peer_can_id,
            declared_size
        );

        if declared_size == 0 {
            let status = Self::completion_status(self.config.crc_policy, context);
            return ProcessResult::Delivered(context.finish(status));
        }
        ProcessResult::FragmentConsumed
    }

    fn continue_exchange(
        &mut self,
        frame: &CbusFrame,
        stream_id: u8,
        peer_can_id: u8,
        now: Instant,
    ) -> ProcessResult {
        let policy = self.config.crc_policy;
        let Some(context) = self
            .contexts
            .iter_mut()
            .find(|c| c.in_use && c.stream_id == stream_id && c.peer_can_id == peer_can_id)
        else {
            return ProcessResult::Ignored;
        };

        let sequence = frame.data[2];
        if sequence != context.expected_next_sequence {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "Long message sequence error: stream={}, expected={}, got={}",
                stream_id,
                context.expected_next_sequence,
                sequence
            );
            return ProcessResult::Delivered(context.finish(LongMessageStatus::SequenceError));
        }

        let remaining = context.declared_size as usize - context.buffer.len();
        let available = frame.len.min(8) - 3;
        let take = remaining.min(available);
        context.buffer.extend_from_slice(&frame.data[3..3 + take]);
        context.expected_next_sequence = next_sequence(sequence);
        context.last_activity = now;

        if context.buffer.len() >= context.declared_size as usize {
            let status = Self::completion_status(policy, context);
            #[cfg(feature = "defmt")]
            defmt::debug!("Long message received: stream={}, status={}", stream_id, status);
            return ProcessResult::Delivered(context.finish(status));
        }
        ProcessResult::FragmentConsumed
    }

    fn completion_status(policy: CrcPolicy, context: &ReceiveContext) -> LongMessageStatus {
        match (policy, context.crc) {
            (CrcPolicy::Strict, Some(expected)) if crc16(&context.buffer) != expected => {
                LongMessageStatus::CrcError
            }
            _ => LongMessageStatus::Complete,
        }
    }

    /// Free every context idle for longer than its stream's receive timeout.
    pub fn reap(&mut self, now: Instant) -> Vec<LongMessage> {
        let subscriptions = &self.subscriptions;
        let default = self.config.receive_timeout;
        let mut expired = Vec::new();
        for context in self.contexts.iter_mut().filter(|c| c.in_use) {
            let timeout = timeout_for(subscriptions, context.stream_id, default);
            if now.saturating_duration_since(context.last_activity) > timeout {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "Long message timed out: stream={}, peer={}, received={}",
                    context.stream_id,
                    context.peer_can_id,
                    context.buffer.len()
                );
                expired.push(context.finish(LongMessageStatus::TimeoutError));
            }
        }
        expired
    }
}

fn timeout_for(subscriptions: &[Subscription], stream_id: u8, default: Duration) -> Duration {
    subscriptions
        .iter()
        .find(|s| s.stream_id == stream_id)
        .map_or(default, |s| s.receive_timeout)
}
