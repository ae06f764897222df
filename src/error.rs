//! Error definitions shared across library modules.
//! Each type models one failure domain (header construction, frame
//! construction, long-message transport, node operation, async supervision).
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur while building an 11-bit CBUS header.
pub enum HeaderError {
    /// Priority does not fit the 4-bit priority field.
    #[error("Invalid priority: {priority}")]
    InvalidPriority { priority: u8 },
    /// CAN-ID is outside the 7-bit range.
    #[error("Invalid CAN-ID: {can_id}")]
    InvalidCanId { can_id: u8 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while building a `CbusFrame`.
pub enum FrameError {
    /// Classic CAN frames carry at most eight data bytes.
    #[error("Payload too long: {len} bytes")]
    PayloadTooLong { len: usize },
    /// Identifier does not fit the addressing mode of the frame.
    #[error("Identifier out of range: {id:#X}")]
    InvalidIdentifier { id: u32 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Failures while parsing an event short code such as `+N22E25`.
pub enum ShortCodeError {
    /// Code does not follow the `[+|-]N<node>E<event>` layout.
    #[error("Malformed short code")]
    Malformed,
    /// Node or event number is not a valid 16-bit value.
    #[error("Invalid node or event number")]
    InvalidNumber,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Long-message transport rejections. None of these affect in-flight exchanges.
pub enum LongMessageError {
    /// Payloads are limited by the 16-bit size field of the header fragment.
    #[error("Payload too large: {len} bytes")]
    PayloadTooLarge { len: usize },
    /// A transmit context for this stream id is still in flight.
    #[error("Stream {stream_id} is busy")]
    StreamBusy { stream_id: u8 },
    /// Every context slot is taken and the pool is not allowed to grow.
    #[error("No free long-message context")]
    NoFreeContext,
    /// Subscription carries no stream id.
    #[error("Empty subscription")]
    EmptySubscription,
}

#[derive(Error, Debug)]
/// Errors surfaced by the node operator API.
pub enum NodeError<E: core::fmt::Debug> {
    /// CAN transport refused the frame.
    #[error("CAN transport send error: {0:?}")]
    Send(E),
    /// CAN-ID outside `1..=99`.
    #[error("Invalid CAN-ID: {can_id}")]
    InvalidCanId { can_id: u8 },
    /// Operation not allowed in the current identity mode.
    #[error("Operation not allowed in current mode")]
    InvalidMode,
    /// Long-message transport rejected the request.
    #[error(transparent)]
    LongMessage(#[from] LongMessageError),
}

#[derive(Error, Debug)]
/// Errors terminating the async node runner.
pub enum SupervisorError<E: core::fmt::Debug> {
    /// Unable to receive frames from the bus.
    #[error("CAN bus receive error: {0:?}")]
    Receive(E),
    /// Bus rejected an outbound frame.
    #[error("CAN bus send error: {0:?}")]
    Send(E),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Rejection from a fixed-capacity frame queue.
pub enum QueueError {
    /// Queue at capacity; the frame was dropped and counted.
    #[error("Frame queue full")]
    Full,
}
