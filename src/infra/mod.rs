//! Infrastructure shared by the protocol layers: the interrupt-safe frame
//! queue and an in-memory configuration store.
pub mod queue;
pub mod store;
