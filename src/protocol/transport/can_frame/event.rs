//! Accessory-event semantics layered over `CbusFrame`: the typed event view,
//! polarity-aware queries and the closed set of frame filters.
use core::fmt;
use core::str::FromStr;

use alloc::vec::Vec;

use crate::core::Polarity;
use crate::error::ShortCodeError;
use crate::protocol::transport::can_frame::CbusFrame;

/// An on/off signal tied to a `(node number, event number)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccessoryEvent {
    pub polarity: Polarity,
    pub node_number: u16,
    pub event_number: u16,
}

impl AccessoryEvent {
    pub fn new(polarity: Polarity, node_number: u16, event_number: u16) -> Self {
        Self {
            polarity,
            node_number,
            event_number,
        }
    }

    /// `(1|0, node, event)` tuple.
    pub fn as_tuple(&self) -> (u8, u16, u16) {
        (self.polarity.as_u8(), self.node_number, self.event_number)
    }

    /// Long-event frame (`ACON`/`ACOF`) carrying this event.
    pub fn to_frame(&self) -> CbusFrame {
        CbusFrame::from_event(self.polarity, self.node_number, self.event_number)
    }
}

impl fmt::Display for AccessoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}N{}E{}",
            self.polarity.sign(),
            self.node_number,
            self.event_number
        )
    }
}

impl From<AccessoryEvent> for EventQuery {
    fn from(event: AccessoryEvent) -> Self {
        EventQuery {
            polarity: Some(event.polarity),
            node_number: event.node_number,
            event_number: event.event_number,
        }
    }
}

//==================================================================================EVENT_QUERY
/// Match key for accessory events. `polarity == None` matches either state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventQuery {
    pub polarity: Option<Polarity>,
    pub node_number: u16,
    pub event_number: u16,
}

impl EventQuery {
    /// Query matching either polarity.
    pub fn any(node_number: u16, event_number: u16) -> Self {
        Self {
            polarity: None,
            node_number,
            event_number,
        }
    }

    pub fn on(node_number: u16, event_number: u16) -> Self {
        Self {
            polarity: Some(Polarity::On),
            node_number,
            event_number,
        }
    }

    pub fn off(node_number: u16, event_number: u16) -> Self {
        Self {
            polarity: Some(Polarity::Off),
            node_number,
            event_number,
        }
    }

    pub fn matches_event(&self, event: &AccessoryEvent) -> bool {
        self.node_number == event.node_number
            && self.event_number == event.event_number
            && self.polarity.is_none_or(|p| p == event.polarity)
    }

    pub fn matches(&self, frame: &CbusFrame) -> bool {
        frame
            .as_event()
            .is_some_and(|event| self.matches_event(&event))
    }
}

impl FromStr for EventQuery {
    type Err = ShortCodeError;

    /// Parse `N22E25`, `+N22E25` or `-N22E25`.
    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let (polarity, rest) = match code.as_bytes().first() {
            Some(b'+') => (Some(Polarity::On), &code[1..]),
            Some(b'-') => (Some(Polarity::Off), &code[1..]),
            Some(_) => (None, code),
            None => return Err(ShortCodeError::Malformed),
        };
        let rest = rest
            .strip_prefix('N')
            .or_else(|| rest.strip_prefix('n'))
            .ok_or(ShortCodeError::Malformed)?;
        let split = rest
            .find(['E', 'e'])
            .ok_or(ShortCodeError::Malformed)?;
        let node_number = rest[..split]
            .parse::<u16>()
            .map_err(|_| ShortCodeError::InvalidNumber)?;
        let event_number = rest[split + 1..]
            .parse::<u16>()
            .map_err(|_| ShortCodeError::InvalidNumber)?;
        Ok(Self {
            polarity,
            node_number,
            event_number,
        })
    }
}

//==================================================================================FRAME_FILTER
/// Closed set of frame selection rules used by the history log and the
/// frame observer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FrameFilter {
    /// Every frame.
    #[default]
    All,
    /// Accessory-event frames only.
    Events,
    /// Frames with one opcode.
    Opcode(u8),
    /// Frames whose opcode is in the list.
    Opcodes(Vec<u8>),
    /// Frames carrying a matching accessory event.
    Event(EventQuery),
}

impl FrameFilter {
    pub fn matches(&self, frame: &CbusFrame) -> bool {
        match self {
            FrameFilter::All => true,
            FrameFilter::Events => frame.is_event(),
            FrameFilter::Opcode(opcode) => frame.opcode() == Some(*opcode),
            FrameFilter::Opcodes(list) => frame.opcode().is_some_and(|op| list.contains(&op)),
            FrameFilter::Event(query) => query.matches(frame),
        }
    }
}
