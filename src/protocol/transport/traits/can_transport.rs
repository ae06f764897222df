//! Blocking CAN transport contract consumed by the node engine. Any
//! transceiver driver satisfying it is interchangeable.
use crate::protocol::transport::can_frame::CbusFrame;

/// Poll-style access to a CAN controller.
pub trait CanTransport {
    type Error: core::fmt::Debug;

    /// Bring the controller up. Drivers that need no setup keep the default.
    fn begin(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// `true` when at least one received frame is waiting.
    fn available(&mut self) -> bool;

    /// Pop the oldest received frame.
    fn get_next_message(&mut self) -> Option<CbusFrame>;

    /// Hand a frame to the controller for transmission. Must not block indefinitely.
    fn send_message(&mut self, frame: &CbusFrame) -> Result<(), Self::Error>;

    /// Frames that can be accepted right now, `None` when the driver never
    /// refuses for lack of room.
    fn send_capacity(&self) -> Option<usize> {
        None
    }
}
