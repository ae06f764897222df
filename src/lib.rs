//! `korri-cbus` library: a CBUS protocol engine for `no_std` targets. The
//! crate exposes the infrastructure modules (frame queue, in-memory config
//! store), the protocol logic (node identity, CAN-ID enumeration, opcode
//! dispatch), the long-message transport, and the event history used by
//! sequencing logic.
#![no_std]
//==================================================================================
extern crate alloc;
//==================================================================================
/// Shared value types and protocol constants.
pub mod core;
/// Runtime configuration of the node, the long-message transport and the history.
pub mod config;
/// Domain and low-level errors (header and frame construction, long-message
/// transport, node operations, async supervision).
pub mod error;
/// Bounded frame queue and RAM-backed configuration store.
pub mod infra;
/// CBUS protocol implementation: CAN transport, long messages, node
/// management, and event history.
pub mod protocol;
//==================================================================================
