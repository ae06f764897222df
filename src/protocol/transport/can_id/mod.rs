//! Creation and extraction of the 11-bit CBUS identifiers:
//! priority in bits 7..=10, CAN-ID in bits 0..=6.
use crate::core::{CAN_ID_MASK, DEFAULT_PRIORITY, MAX_STANDARD_ID};
use crate::error::HeaderError;

//==================================================================================CBUS_HEADER
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates a standard CAN identifier (11 bits) and exposes accessors
/// for the priority nibble and the 7-bit CAN-ID.
pub struct CbusHeader(pub u16);

impl CbusHeader {
    // Builder entry point
    /// Creates a pre-configured `CbusHeaderBuilder` for a CAN-ID.
    pub fn builder(can_id: u8) -> CbusHeaderBuilder {
        CbusHeaderBuilder::new(can_id)
    }

    /// Returns the priority nibble (0-15).
    pub fn priority(&self) -> u8 {
        ((self.0 >> 7) & 0x0F) as u8
    }

    /// Seven-bit CAN-ID of the sender.
    pub fn can_id(&self) -> u8 {
        (self.0 & CAN_ID_MASK) as u8
    }

    /// Raw identifier, masked to 11 bits.
    pub fn raw(&self) -> u16 {
        self.0 & MAX_STANDARD_ID
    }
}

//==================================================================================CBUS_HEADER_BUILDER
#[derive(Debug)]
/// Fluent builder that validates priority and CAN-ID ranges.
pub struct CbusHeaderBuilder {
    pub priority: u8,
    pub can_id: u8,
}

impl CbusHeaderBuilder {
    /// Initializes the builder for a given CAN-ID with the default priority.
    pub fn new(can_id: u8) -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            can_id,
        }
    }

    /// Sets the priority nibble to use during construction.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Builds the identifier. Out-of-range values are rejected rather than masked.
    pub fn build(self) -> Result<CbusHeader, HeaderError> {
        if self.priority > 0x0F {
            return Err(HeaderError::InvalidPriority {
                priority: self.priority,
            });
        }
        if self.can_id as u16 > CAN_ID_MASK {
            return Err(HeaderError::InvalidCanId {
                can_id: self.can_id,
            });
        }
        Ok(CbusHeader(
            ((self.priority as u16) << 7) | (self.can_id as u16),
        ))
    }
}
