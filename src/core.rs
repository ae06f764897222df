//! Value types shared by the transport, history, and node-management layers.
//!
//! Nothing here depends on a bus or a store; these are the small enums and
//! constants every other module speaks in.

/// Lowest CAN-ID a node may hold on the bus.
pub const MIN_CAN_ID: u8 = 1;
/// Highest CAN-ID handed out by enumeration.
pub const MAX_CAN_ID: u8 = 99;
/// Mask selecting the 7-bit CAN-ID inside an 11-bit identifier.
pub const CAN_ID_MASK: u16 = 0x7F;
/// Largest 11-bit standard identifier.
pub const MAX_STANDARD_ID: u16 = 0x7FF;
/// Default CBUS priority nibble (major 2, minor 3).
pub const DEFAULT_PRIORITY: u8 = 0x0B;

/// Identity mode of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeMode {
    /// Unconfigured: no node number, consumer of default events only.
    Slim,
    /// Configured: owns a node number assigned by a configuration tool.
    Flim,
    /// Negotiating a node number (`RQNN` sent, waiting for `SNN`).
    Changing,
}

impl NodeMode {
    /// Encoding used by persisted configuration.
    pub fn as_u8(self) -> u8 {
        match self {
            NodeMode::Slim => 0,
            NodeMode::Flim => 1,
            NodeMode::Changing => 2,
        }
    }

    /// Decode a persisted mode byte. Unknown values fall back to SLIM.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => NodeMode::Flim,
            2 => NodeMode::Changing,
            _ => NodeMode::Slim,
        }
    }
}

/// On/off state carried by an accessory event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    On,
    Off,
}

impl Polarity {
    /// `1` for on, `0` for off: the numeric form used in event tuples.
    pub fn as_u8(self) -> u8 {
        match self {
            Polarity::On => 1,
            Polarity::Off => 0,
        }
    }

    /// Polarity implied by an accessory opcode: even opcodes are "on", odd are "off".
    pub fn from_opcode(opcode: u8) -> Self {
        if opcode & 0x01 == 0 {
            Polarity::On
        } else {
            Polarity::Off
        }
    }

    /// Short-code prefix (`+` / `-`).
    pub fn sign(self) -> char {
        match self {
            Polarity::On => '+',
            Polarity::Off => '-',
        }
    }
}
