//! Collaborator contracts used by the node engine: CAN transports (blocking
//! and async), the persisted configuration store, and the timer.
pub mod can_bus;
pub mod can_transport;
pub mod cbus_timer;
pub mod config_store;
