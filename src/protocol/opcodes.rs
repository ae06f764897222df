//! CBUS opcode values used by the node engine.
//!
//! The top three bits of an opcode encode how many data bytes follow it
//! (`opcode >> 5`), so every constant below also fixes its frame length.

// Node management
pub const QNN: u8 = 0x0D;
pub const RQNP: u8 = 0x10;
pub const RQMN: u8 = 0x11;
pub const SNN: u8 = 0x42;
pub const RQNN: u8 = 0x50;
pub const NNREL: u8 = 0x51;
pub const NNACK: u8 = 0x52;
pub const NNLRN: u8 = 0x53;
pub const NNULN: u8 = 0x54;
pub const NNCLR: u8 = 0x55;
pub const NNEVN: u8 = 0x56;
pub const NERD: u8 = 0x57;
pub const RQEVN: u8 = 0x58;
pub const WRACK: u8 = 0x59;
pub const ENUM: u8 = 0x5D;
pub const CMDERR: u8 = 0x6F;
pub const EVNLF: u8 = 0x70;
pub const NVRD: u8 = 0x71;
pub const RQNPN: u8 = 0x73;
pub const NUMEV: u8 = 0x74;
pub const CANID: u8 = 0x75;
pub const EVULN: u8 = 0x95;
pub const NVSET: u8 = 0x96;
pub const NVANS: u8 = 0x97;
pub const PARAN: u8 = 0x9B;
pub const REVAL: u8 = 0x9C;
pub const NEVAL: u8 = 0xB5;
pub const PNN: u8 = 0xB6;
pub const EVLRN: u8 = 0xD2;
pub const NAME: u8 = 0xE2;
pub const DTXC: u8 = 0xE9;
pub const PARAMS: u8 = 0xEF;
pub const ENRSP: u8 = 0xF2;

// Accessory events
pub const ACON: u8 = 0x90;
pub const ACOF: u8 = 0x91;
pub const ASON: u8 = 0x98;
pub const ASOF: u8 = 0x99;
pub const ACON1: u8 = 0xB0;
pub const ACOF1: u8 = 0xB1;
pub const ASON1: u8 = 0xB8;
pub const ASOF1: u8 = 0xB9;
pub const ACON2: u8 = 0xD0;
pub const ACOF2: u8 = 0xD1;
pub const ASON2: u8 = 0xD8;
pub const ASOF2: u8 = 0xD9;
pub const ACON3: u8 = 0xF0;
pub const ACOF3: u8 = 0xF1;
pub const ASON3: u8 = 0xF8;
pub const ASOF3: u8 = 0xF9;

/// Every accessory-event opcode (long and short, 0 to 3 extra bytes).
pub const EVENT_OPCODES: [u8; 16] = [
    ACON, ACOF, ASON, ASOF, ACON1, ACOF1, ASON1, ASOF1, ACON2, ACOF2, ASON2, ASOF2, ACON3, ACOF3,
    ASON3, ASOF3,
];

/// `true` when `opcode` is one of the accessory-event opcodes.
pub fn is_event_opcode(opcode: u8) -> bool {
    EVENT_OPCODES.contains(&opcode)
}

/// `true` for the short-event (device number) variants.
pub fn is_short_event_opcode(opcode: u8) -> bool {
    is_event_opcode(opcode) && opcode & 0x08 != 0
}

/// Number of data bytes following `opcode` on the wire.
pub fn data_bytes(opcode: u8) -> usize {
    (opcode >> 5) as usize
}

/// Accessory-event opcode for a polarity, short/long form and number of extra bytes (0..=3).
pub fn event_opcode(on: bool, short: bool, extra_bytes: u8) -> u8 {
    let base = match extra_bytes.min(3) {
        0 => ACON,
        1 => ACON1,
        2 => ACON2,
        _ => ACON3,
    };
    let base = if short { base | 0x08 } else { base };
    if on {
        base
    } else {
        base | 0x01
    }
}

/// Error codes carried by `CMDERR`.
pub mod cmderr {
    pub const NOT_LEARN_MODE: u8 = 2;
    pub const INVALID_EVENT: u8 = 6;
    pub const INVALID_CAN_ID: u8 = 7;
    pub const INVALID_PARAM_INDEX: u8 = 9;
    pub const INVALID_NV_OR_WRITE: u8 = 10;
}
