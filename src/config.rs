//! Runtime configuration for the node engine, the long-message transport
//! and the event history. Every struct has protocol-conformant defaults and
//! fluent setters in the style of the header builder.
use embassy_time::Duration;

use crate::core::DEFAULT_PRIORITY;
use crate::protocol::managment::params::NodeParams;
use crate::protocol::transport::can_frame::FrameFilter;
use crate::protocol::transport::{
    ENUMERATION_WINDOW_MS, HISTORY_TTL_MS, LONG_MESSAGE_FRAGMENT_INTERVAL_MS,
    LONG_MESSAGE_RECEIVE_TIMEOUT_MS, TRANSITION_TIMEOUT_MS,
};

/// Default number of frames drained from the inbound queue per processing tick.
pub const DEFAULT_MAX_MESSAGES: usize = 3;
/// Default history capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;
/// Default number of pre-allocated long-message contexts per direction.
pub const DEFAULT_CONTEXT_POOL: usize = 4;

//==================================================================================NODE_CONFIG
/// Static description and behaviour switches of a node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Seven-character module name returned by `RQMN`.
    pub name: [u8; 7],
    /// Parameter block returned by `RQNP`/`RQNPN`.
    pub params: NodeParams,
    /// Upper bound on frames dispatched per tick.
    pub max_messages: usize,
    /// Loop every transmitted frame back into the inbound queue.
    pub consume_own_messages: bool,
    /// Priority stamped on frames sent without one.
    pub default_priority: u8,
    /// How long a SLIM/FLIM transition may stay open.
    pub transition_timeout: Duration,
    /// Listening window of an enumeration round.
    pub enumeration_window: Duration,
    /// Frames forwarded to `NodeHandler::on_frame`.
    pub frame_filter: FrameFilter,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: *b"KORRI  ",
            params: NodeParams::default(),
            max_messages: DEFAULT_MAX_MESSAGES,
            consume_own_messages: false,
            default_priority: DEFAULT_PRIORITY,
            transition_timeout: Duration::from_millis(TRANSITION_TIMEOUT_MS),
            enumeration_window: Duration::from_millis(ENUMERATION_WINDOW_MS),
            frame_filter: FrameFilter::All,
        }
    }
}

impl NodeConfig {
    /// Module name, space-padded or truncated to seven characters.
    pub fn with_name(mut self, name: &str) -> Self {
        let mut buffer = [b' '; 7];
        for (slot, byte) in buffer.iter_mut().zip(name.bytes()) {
            *slot = byte;
        }
        self.name = buffer;
        self
    }

    pub fn with_params(mut self, params: NodeParams) -> Self {
        self.params = params;
        self
    }

    /// At least one frame is always processed per tick.
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages.max(1);
        self
    }

    pub fn with_consume_own_messages(mut self, consume: bool) -> Self {
        self.consume_own_messages = consume;
        self
    }

    pub fn with_default_priority(mut self, priority: u8) -> Self {
        self.default_priority = priority & 0x0F;
        self
    }

    pub fn with_transition_timeout(mut self, timeout: Duration) -> Self {
        self.transition_timeout = timeout;
        self
    }

    pub fn with_enumeration_window(mut self, window: Duration) -> Self {
        self.enumeration_window = window;
        self
    }

    pub fn with_frame_filter(mut self, filter: FrameFilter) -> Self {
        self.frame_filter = filter;
        self
    }
}

//==================================================================================LONG_MESSAGE_CONFIG
/// What to do when a completed long message fails its CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrcPolicy {
    /// Deliver as complete regardless of the checksum.
    #[default]
    Advisory,
    /// Deliver with `LongMessageStatus::CrcError` on mismatch.
    Strict,
}

/// Long-message transport tuning.
#[derive(Debug, Clone, Copy)]
pub struct LongMessageConfig {
    /// Minimum spacing between two fragments of one transmit context.
    pub fragment_interval: Duration,
    /// Receive contexts idle for longer than this are abandoned.
    pub receive_timeout: Duration,
    /// Pre-allocated contexts per direction.
    pub context_pool: usize,
    /// Allocate extra contexts when the pool is exhausted.
    pub allow_growth: bool,
    /// Compute and transmit a CRC with every message.
    pub use_crc: bool,
    pub crc_policy: CrcPolicy,
}

impl Default for LongMessageConfig {
    fn default() -> Self {
        Self {
            fragment_interval: Duration::from_millis(LONG_MESSAGE_FRAGMENT_INTERVAL_MS),
            receive_timeout: Duration::from_millis(LONG_MESSAGE_RECEIVE_TIMEOUT_MS),
            context_pool: DEFAULT_CONTEXT_POOL,
            allow_growth: true,
            use_crc: true,
            crc_policy: CrcPolicy::Advisory,
        }
    }
}

impl LongMessageConfig {
    pub fn with_fragment_interval(mut self, interval: Duration) -> Self {
        self.fragment_interval = interval;
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn with_context_pool(mut self, size: usize, allow_growth: bool) -> Self {
        self.context_pool = size;
        self.allow_growth = allow_growth;
        self
    }

    pub fn with_crc(mut self, use_crc: bool, policy: CrcPolicy) -> Self {
        self.use_crc = use_crc;
        self.crc_policy = policy;
        self
    }
}

//==================================================================================HISTORY_CONFIG
/// Behaviour of the history log once it holds `capacity` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverflowPolicy {
    /// Keep existing entries, discard the incoming one.
    #[default]
    DropNewest,
    /// Discard the oldest entry to make room.
    EvictOldest,
}

/// Event history retention settings.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub capacity: usize,
    pub ttl: Duration,
    pub filter: FrameFilter,
    pub overflow: OverflowPolicy,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
            ttl: Duration::from_millis(HISTORY_TTL_MS),
            filter: FrameFilter::All,
            overflow: OverflowPolicy::DropNewest,
        }
    }
}

impl HistoryConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_filter(mut self, filter: FrameFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }
}
