//! CAN-ID enumeration: the distributed procedure a node runs to pick an
//! unused CAN-ID after a clash, or when asked to by `ENUM` or an operator.
//!
//! Strategy:
//! 1. Broadcast a zero-length remote request at the current CAN-ID.
//! 2. For the listening window, record the CAN-ID of every frame seen.
//! 3. Pick the lowest CAN-ID in `1..=99` nobody answered with.
use embassy_time::{Duration, Instant};

use crate::core::{MAX_CAN_ID, MIN_CAN_ID};

/// How a closed round ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnumerationOutcome {
    /// Nobody answered and nothing forced a change: keep the current CAN-ID.
    NoResponses,
    /// Adopt this CAN-ID.
    Selected(u8),
    /// Every CAN-ID in `1..=99` is taken.
    Exhausted,
}

/// One listening window. Owned by the node; at most one exists at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationRound {
    responses: [bool; 128],
    started_at: Instant,
    response_count: u32,
    /// Started because another node uses our CAN-ID.
    forced: bool,
}

impl EnumerationRound {
    pub fn new(now: Instant, forced: bool) -> Self {
        Self {
            responses: [false; 128],
            started_at: now,
            response_count: 0,
            forced,
        }
    }

    /// Record a CAN-ID seen on the bus during the window.
    pub fn record(&mut self, can_id: u8) {
        let slot = (can_id & 0x7F) as usize;
        if !self.responses[slot] {
            self.responses[slot] = true;
        }
        self.response_count += 1;
    }

    pub fn response_count(&self) -> u32 {
        self.response_count
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn is_taken(&self, can_id: u8) -> bool {
        self.responses[(can_id & 0x7F) as usize]
    }

    /// `true` once the listening window has elapsed.
    pub fn is_closed(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.started_at) >= window
    }

    /// Decide the round.
    pub fn outcome(&self) -> EnumerationOutcome {
        if self.response_count == 0 && !self.forced {
            return EnumerationOutcome::NoResponses;
        }
        match lowest_free_can_id(&self.responses) {
            Some(can_id) => EnumerationOutcome::Selected(can_id),
            None => EnumerationOutcome::Exhausted,
        }
    }
}

/// Lowest CAN-ID in `1..=99` not marked in `taken`.
pub fn lowest_free_can_id(taken: &[bool; 128]) -> Option<u8> {
    (MIN_CAN_ID..=MAX_CAN_ID).find(|id| !taken[*id as usize])
}
