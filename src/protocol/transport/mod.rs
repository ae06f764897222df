//! CBUS transport layer: CAN frame representation, 11-bit header handling,
//! long-message segmentation, and the collaborator traits (bus, store, timer).
//!
//! ## CBUS Timing Constants
//!
//! These constants are the protocol's reference timings. All of them can be
//! overridden through [`crate::config`].

pub mod can_frame;
pub mod can_id;
pub mod long_message;
pub mod traits;

/// Maximum time a node may stay in the SLIM/FLIM transition before it gives up (ms).
///
/// A configuration tool answering `RQNN` with `SNN` normally does so within a second;
/// the 30 s budget covers an operator typing a node number by hand.
pub const TRANSITION_TIMEOUT_MS: u64 = 30_000;

/// Listening window of a CAN-ID enumeration round (ms).
///
/// Every node on the segment answers the remote-request probe immediately, so
/// 100 ms comfortably covers a fully loaded 125 kbit/s bus.
pub const ENUMERATION_WINDOW_MS: u64 = 100;

/// Minimum spacing between two fragments of the same long message (ms).
///
/// Keeps a bulk transfer from starving accessory events of bus time.
pub const LONG_MESSAGE_FRAGMENT_INTERVAL_MS: u64 = 10;

/// Default idle time after which a partially received long message is abandoned (ms).
pub const LONG_MESSAGE_RECEIVE_TIMEOUT_MS: u64 = 5_000;

/// Default time-to-live of an entry in the event history (ms).
pub const HISTORY_TTL_MS: u64 = 10_000;

/// Cadence at which the async runner ticks the node engine (ms).
pub const NODE_TICK_INTERVAL_MS: u32 = 5;
