//! Long-message transport: carries payloads larger than one frame as a
//! header fragment followed by five-byte continuation fragments, all using
//! the `DTXC` opcode.
//!
//! ```text
//! header:        [DTXC, stream, 0,   size_hi, size_lo, crc_hi, crc_lo, flags]
//! continuation:  [DTXC, stream, seq, d0, d1, d2, d3, d4]
//! ```
//!
//! Sequence numbers run 1..=255 and then wrap back to 1, so `0` always marks a header.
use alloc::vec::Vec;
use embassy_time::{Duration, Instant};

use crate::config::LongMessageConfig;
use crate::error::LongMessageError;
use crate::protocol::transport::can_frame::CbusFrame;

pub mod assembler;
pub mod builder;
pub mod crc;

use assembler::{LongMessageAssembler, ProcessResult};
use builder::LongMessageBuilder;

/// Largest payload accepted by `send` (16-bit size field).
pub const MAX_LONG_MESSAGE_PAYLOAD: usize = u16::MAX as usize;
/// Payload bytes carried by one continuation fragment.
pub const FRAGMENT_PAYLOAD: usize = 5;
/// Header flag: the CRC field is meaningful.
pub const FLAG_CRC_PRESENT: u8 = 0x01;

/// Outcome reported with every delivered long message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LongMessageStatus {
    Complete,
    SequenceError,
    TimeoutError,
    /// Only reported under `CrcPolicy::Strict`.
    CrcError,
}

/// A received long message, complete or abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongMessage {
    pub stream_id: u8,
    /// CAN-ID of the sender.
    pub peer_can_id: u8,
    pub status: LongMessageStatus,
    /// Whole payload on success, accumulated prefix otherwise.
    pub payload: Vec<u8>,
}

/// Wire sequence number of the `n`-th continuation fragment (1-based).
pub(crate) fn wire_sequence(fragment: u32) -> u8 {
    ((fragment.saturating_sub(1) % 255) + 1) as u8
}

/// Sequence number expected after `current`.
pub(crate) fn next_sequence(current: u8) -> u8 {
    if current == u8::MAX {
        1
    } else {
        current + 1
    }
}

//==================================================================================TRANSPORT
/// Both directions of the long-message transport behind one handle.
#[derive(Debug)]
pub struct LongMessageTransport {
    builder: LongMessageBuilder,
    assembler: LongMessageAssembler,
}

impl Default for LongMessageTransport {
    fn default() -> Self {
        Self::new(LongMessageConfig::default())
    }
}

impl LongMessageTransport {
    pub fn new(config: LongMessageConfig) -> Self {
        Self {
            builder: LongMessageBuilder::new(config),
            assembler: LongMessageAssembler::new(config),
        }
    }

    /// Queue `payload` on `stream_id` and return the header fragment to transmit now.
    pub fn send(
        &mut self,
        payload: &[u8],
        stream_id: u8,
        priority: u8,
        now: Instant,
    ) -> Result<CbusFrame, LongMessageError> {
        self.builder.send(payload, stream_id, priority, now)
    }

    /// Drop the transmission in flight on `stream_id`.
    pub fn abort(&mut self, stream_id: u8) -> bool {
        self.builder.abort(stream_id)
    }

    /// Next due continuation fragment, if any (one per context per pass).
    pub fn poll_transmit(&mut self, now: Instant) -> Option<CbusFrame> {
        self.builder.poll(now)
    }

    /// Number of transmit contexts, i.e. the upper bound on fragments per pass.
    pub fn transmit_slots(&self) -> usize {
        self.builder.slots()
    }

    /// Transmit contexts still in flight.
    pub fn pending_transmits(&self) -> usize {
        self.builder.in_flight()
    }

    /// Accept fragments for `stream_ids`, abandoning exchanges idle for `receive_timeout`.
    pub fn subscribe(
        &mut self,
        stream_ids: &[u8],
        receive_timeout: Duration,
    ) -> Result<(), LongMessageError> {
        self.assembler.subscribe(stream_ids, receive_timeout)
    }

    /// Feed a received `DTXC` frame.
    pub fn process_frame(&mut self, frame: &CbusFrame, now: Instant) -> Option<LongMessage> {
        match self.assembler.process_frame(frame, now) {
            ProcessResult::Delivered(message) => Some(message),
            ProcessResult::Ignored | ProcessResult::FragmentConsumed => None,
        }
    }

    /// Abandon stale receive contexts, returning their partial payloads.
    pub fn reap(&mut self, now: Instant) -> Vec<LongMessage> {
        self.assembler.reap(now)
    }
}
