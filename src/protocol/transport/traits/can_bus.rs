//! Minimal abstraction for an asynchronous CAN bus, used by the node runner to
//! plug the engine into interrupt-driven drivers (embedded HAL, SocketCAN, etc.).
use crate::protocol::transport::can_frame::CbusFrame;
use futures_util::Future;

/// Contract to send and receive CAN frames asynchronously.
pub trait CanBus {
    type Error: core::fmt::Debug;
    /// Emit a frame on the bus. Asynchronous to accommodate non-blocking drivers.
    fn send<'a>(
        &'a mut self,
        frame: &'a CbusFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;
    /// Retrieve the next available frame. Asynchronously waits until data arrives.
    fn recv<'a>(&'a mut self) -> impl Future<Output = Result<CbusFrame, Self::Error>> + 'a;
}
