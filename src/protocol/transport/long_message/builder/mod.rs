//! Transmit side of the long-message transport: claims a context per
//! message, emits the header immediately and releases continuation fragments
//! on a fixed cadence, round-robin across contexts.
use alloc::vec::Vec;
use embassy_time::Instant;

use super::{crc::crc16, wire_sequence, FLAG_CRC_PRESENT, FRAGMENT_PAYLOAD, MAX_LONG_MESSAGE_PAYLOAD};
use crate::config::LongMessageConfig;
use crate::error::LongMessageError;
use crate::protocol::opcodes::DTXC;
use crate::protocol::transport::can_frame::CbusFrame;

/// One in-flight outbound message.
#[derive(Debug, Clone)]
struct TransmitContext {
    in_use: bool,
    stream_id: u8,
    priority: u8,
    buffer: Vec<u8>,
    /// Continuation fragments emitted so far.
    sequence: u32,
    /// Bytes already sent.
    cursor: usize,
    last_activity: Instant,
}

impl TransmitContext {
    const fn new() -> Self {
        Self {
            in_use: false,
            stream_id: 0,
            priority: 0,
            buffer: Vec::new(),
            sequence: 0,
            cursor: 0,
            last_activity: Instant::from_ticks(0),
        }
    }

    /// Release the slot; the buffer allocation is kept for the next message.
    fn reset(&mut self) {
        self.in_use = false;
        self.buffer.clear();
        self.sequence = 0;
        self.cursor = 0;
    }
}

/// Pool of transmit contexts with a round-robin scheduler.
#[derive(Debug)]
pub struct LongMessageBuilder {
    contexts: Vec<TransmitContext>,
    next: usize,
    config: LongMessageConfig,
}

impl LongMessageBuilder {
    pub fn new(config: LongMessageConfig) -> Self {
        let mut contexts = Vec::with_capacity(config.context_pool);
        contexts.resize(config.context_pool, TransmitContext::new());
        Self {
            contexts,
            next: 0,
            config,
        }
    }

    /// Start a message and return its header fragment.
    ///
    /// Empty payloads are complete after the header; no context is claimed.
    pub fn send(
        &mut self,
        payload: &[u8],
        stream_id: u8,
        priority: u8,
        now: Instant,
    ) -> Result<CbusFrame, LongMessageError> {
        if payload.len() > MAX_LONG_MESSAGE_PAYLOAD {
            return Err(LongMessageError::PayloadTooLarge { len: payload.len() });
        }
        if self.is_busy(stream_id) {
            return Err(LongMessageError::StreamBusy { stream_id });
        }

        let (crc, flags) = if self.config.use_crc {
            (crc16(payload), FLAG_CRC_PRESENT)
        } else {
            (0, 0)
        };
        let [size_hi, size_lo] = (payload.len() as u16).to_be_bytes();
        let [crc_hi, crc_lo] = crc.to_be_bytes();
        let mut header = CbusFrame::with_opcode(
            DTXC,
            &[stream_id, 0, size_hi, size_lo, crc_hi, crc_lo, flags],
        );
        header.make_header(0, priority);

        if payload.is_empty() {
            return Ok(header);
        }

        let index = self.claim_slot()?;
        let context = &mut self.contexts[index];
        context.in_use = true;
        context.stream_id = stream_id;
        context.priority = priority;
        context.buffer.extend_from_slice(payload);
        context.sequence = 0;
        context.cursor = 0;
        context.last_activity = now;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Long message queued: stream={}, size={}, slot={}",
            stream_id,
            payload.len(),
            index
        );

        Ok(header)
    }

    /// Emit the next fragment of the first ready context after the last one served.
    pub fn poll(&mut self, now: Instant) -> Option<CbusFrame> {
        let count = self.contexts.len();
        for offset in 0..count {
            let index = (self.next + offset) % count;
            let interval = self.config.fragment_interval;
            let context = &mut self.contexts[index];
            if !context.in_use {
                continue;
            }
            if now.saturating_duration_since(context.last_activity) < interval {
                continue;
            }

            let end = (context.cursor + FRAGMENT_PAYLOAD).min(context.buffer.len());
            context.sequence += 1;
            let mut args = [0u8; 2 + FRAGMENT_PAYLOAD];
            args[0] = context.stream_id;
            args[1] = wire_sequence(context.sequence);
            let chunk = &context.buffer[context.cursor..end];
            args[2..2 + chunk.len()].copy_from_slice(chunk);

            let mut frame = CbusFrame::with_opcode(DTXC, &args);
            frame.len = 3 + chunk.len();
            frame.make_header(0, context.priority);

            context.cursor = end;
            context.last_activity = now;
            if context.cursor >= context.buffer.len() {
                #[cfg(feature = "defmt")]
                defmt::debug!("Long message sent: stream={}", context.stream_id);
                context.reset();
            }

            self.next = (index + 1) % count;
            return Some(frame);
        }
        None
    }

    /// Release the context sending on `stream_id`. Returns `false` when
    /// nothing was in flight there.
    pub fn abort(&mut self, stream_id: u8) -> bool {
        let Some(context) = self
            .contexts
            .iter_mut()
            .find(|c| c.in_use && c.stream_id == stream_id)
        else {
            return false;
        };
        #[cfg(feature = "defmt")]
        defmt::debug!("Long message aborted: stream={}", stream_id);
        context.reset();
        true
    }

    /// `true` when a message on `stream_id` is still being transmitted.
    pub fn is_busy(&self, stream_id: u8) -> bool {
        self.contexts
            .iter()
            .any(|c| c.in_use && c.stream_id == stream_id)
    }

    pub fn slots(&self) -> usize {
        self.contexts.len()
    }

    pub fn in_flight(&self) -> usize {
        self.contexts.iter().filter(|c| c.in_use).count()
    }

    fn claim_slot(&mut self) -> Result<usize, LongMessageError> {
        if let Some(index) = self.contexts.iter().position(|c| !c.in_use) {
            return Ok(index);
        }
        if self.config.allow_growth {
            self.contexts.push(TransmitContext::new());
            return Ok(self.contexts.len() - 1);
        }
        #[cfg(feature = "defmt")]
        defmt::warn!("No free long-message transmit context");
        Err(LongMessageError::NoFreeContext)
    }
}
