//! Asynchronous timer abstraction pacing the node runner.

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait CbusTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(&'a mut self, millis: u32) -> impl core::future::Future<Output = ()> + 'a;
}
