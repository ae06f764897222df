//! High-level components of the CBUS protocol: opcode table, event history,
//! node management, and CAN/long-message transport.
pub mod history;
pub mod managment;
pub mod opcodes;
pub mod transport;
