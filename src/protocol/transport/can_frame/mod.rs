//! In-memory representation of a CBUS CAN frame and its accessory-event view.
use crate::core::{Polarity, CAN_ID_MASK};
use crate::error::FrameError;
use crate::protocol::opcodes;
use crate::protocol::transport::can_id::CbusHeader;
use embedded_can::{ExtendedId, Id, StandardId};

pub mod event;

pub use event::{AccessoryEvent, EventQuery, FrameFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Raw CBUS frame as read from or written to the CAN bus.
pub struct CbusFrame {
    /// CAN identifier. CBUS traffic is standard (11-bit); extended frames belong
    /// to bootloaders and are carried but never dispatched.
    pub id: Id,
    /// Payload buffer. Bytes past `len` are zero.
    pub data: [u8; 8],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
    /// Remote transmission request flag.
    pub remote: bool,
}

impl Default for CbusFrame {
    fn default() -> Self {
        Self {
            id: Id::Standard(StandardId::ZERO),
            data: [0; 8],
            len: 0,
            remote: false,
        }
    }
}

impl CbusFrame {
    /// Build a standard data frame from a header and up to eight payload bytes.
    pub fn new(header: CbusHeader, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > 8 {
            return Err(FrameError::PayloadTooLong { len: payload.len() });
        }
        let mut data = [0u8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id: standard_id(header),
            data,
            len: payload.len(),
            remote: false,
        })
    }

    /// Build a frame from a CAN-ID, an opcode and its arguments.
    ///
    /// The length is the one declared by the opcode; missing arguments are
    /// zero-padded and surplus arguments are dropped.
    pub fn from_opcode(can_id: u8, opcode: u8, args: &[u8]) -> Self {
        let declared = opcodes::data_bytes(opcode);
        let mut data = [0u8; 8];
        data[0] = opcode;
        let copied = args.len().min(declared);
        data[1..1 + copied].copy_from_slice(&args[..copied]);
        Self {
            id: standard_id(CbusHeader((can_id as u16) & CAN_ID_MASK)),
            data,
            len: 1 + declared,
            remote: false,
        }
    }

    /// Same as [`CbusFrame::from_opcode`] with the CAN-ID left blank, ready to be
    /// stamped by the node on transmission.
    pub fn with_opcode(opcode: u8, args: &[u8]) -> Self {
        Self::from_opcode(0, opcode, args)
    }

    /// Build a long accessory event (`ACON`/`ACOF`) from a `(polarity, node, event)` tuple.
    pub fn from_event(polarity: Polarity, node_number: u16, event_number: u16) -> Self {
        let opcode = match polarity {
            Polarity::On => opcodes::ACON,
            Polarity::Off => opcodes::ACOF,
        };
        let [nh, nl] = node_number.to_be_bytes();
        let [eh, el] = event_number.to_be_bytes();
        Self::with_opcode(opcode, &[nh, nl, eh, el])
    }

    /// Zero-length remote request used to probe CAN-ID usage during enumeration.
    pub fn enumeration_probe(header: CbusHeader) -> Self {
        Self {
            id: standard_id(header),
            remote: true,
            ..Self::default()
        }
    }

    /// Zero-length data frame answering another node's enumeration probe.
    pub fn enumeration_response(header: CbusHeader) -> Self {
        Self {
            id: standard_id(header),
            ..Self::default()
        }
    }

    /// Wrap an extended (29-bit) frame.
    pub fn extended(id: u32, payload: &[u8]) -> Result<Self, FrameError> {
        let ext = ExtendedId::new(id).ok_or(FrameError::InvalidIdentifier { id })?;
        if payload.len() > 8 {
            return Err(FrameError::PayloadTooLong { len: payload.len() });
        }
        let mut data = [0u8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id: Id::Extended(ext),
            data,
            len: payload.len(),
            remote: false,
        })
    }

    //==================================================================================HEADER
    /// 11-bit header view. For extended frames the low 11 bits are used.
    pub fn header(&self) -> CbusHeader {
        match self.id {
            Id::Standard(id) => CbusHeader(id.as_raw()),
            Id::Extended(id) => CbusHeader((id.as_raw() & 0x7FF) as u16),
        }
    }

    /// Sender CAN-ID (low 7 bits of the identifier).
    pub fn can_id(&self) -> u8 {
        self.header().can_id()
    }

    /// Priority nibble.
    pub fn priority(&self) -> u8 {
        self.header().priority()
    }

    /// Address the frame with `can_id` and `priority`.
    ///
    /// Does nothing when the frame already carries a different CAN-ID: a frame
    /// addressed by another node is never re-prioritised.
    pub fn make_header(&mut self, can_id: u8, priority: u8) {
        let can_id = can_id & CAN_ID_MASK as u8;
        let current = self.can_id();
        if self.is_extended() || (current != 0 && current != can_id) {
            return;
        }
        self.id = standard_id(CbusHeader(
            (((priority & 0x0F) as u16) << 7) | can_id as u16,
        ));
    }

    pub fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Zero data length frames are enumeration traffic, never events.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(8)]
    }

    //==================================================================================CONTENT
    /// First data byte, when present.
    pub fn opcode(&self) -> Option<u8> {
        if self.len == 0 || self.remote {
            None
        } else {
            Some(self.data[0])
        }
    }

    /// `true` when the opcode is one of the accessory-event opcodes.
    pub fn is_event(&self) -> bool {
        self.opcode().is_some_and(opcodes::is_event_opcode)
    }

    /// Big-endian node number carried in bytes 1-2.
    pub fn node_number(&self) -> u16 {
        u16::from_be_bytes([self.data[1], self.data[2]])
    }

    /// Big-endian node and event numbers carried in bytes 1-2 and 3-4.
    pub fn node_and_event_numbers(&self) -> (u16, u16) {
        (
            self.node_number(),
            u16::from_be_bytes([self.data[3], self.data[4]]),
        )
    }

    /// Polarity derived from the opcode parity (even = on, odd = off).
    pub fn polarity(&self) -> Polarity {
        Polarity::from_opcode(self.data[0])
    }

    /// `(polarity, node, event)` with polarity as `1` (on) or `0` (off).
    pub fn as_tuple(&self) -> (u8, u16, u16) {
        let (node, event) = self.node_and_event_numbers();
        (self.polarity().as_u8(), node, event)
    }

    /// Accessory-event view, `None` for non-event frames.
    pub fn as_event(&self) -> Option<AccessoryEvent> {
        if !self.is_event() {
            return None;
        }
        let (node_number, event_number) = self.node_and_event_numbers();
        Some(AccessoryEvent {
            polarity: self.polarity(),
            node_number,
            event_number,
        })
    }

    /// Short code such as `+N22E25`; `None` for non-event frames.
    pub fn as_short_code(&self) -> Option<alloc::string::String> {
        use alloc::string::ToString;
        self.as_event().map(|event| event.to_string())
    }

    /// Extra data bytes following the event numbers (0 to 3).
    pub fn event_data(&self) -> &[u8] {
        if self.len > 5 {
            &self.data[5..self.len]
        } else {
            &[]
        }
    }
}

fn standard_id(header: CbusHeader) -> Id {
    Id::Standard(StandardId::new(header.raw()).unwrap_or(StandardId::ZERO))
}

//==================================================================================EMBEDDED_CAN
impl embedded_can::Frame for CbusFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buffer = [0u8; 8];
        buffer[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            data: buffer,
            len: data.len(),
            remote: false,
        })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(Self {
            id: id.into(),
            data: [0; 8],
            len: dlc,
            remote: true,
        })
    }

    fn is_extended(&self) -> bool {
        CbusFrame::is_extended(self)
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            self.payload()
        }
    }
}
