//! Node management: parameter block, identity state machine, CAN-ID
//! enumeration, the protocol engine and its async runner.
pub mod enumeration;
pub mod node;
pub mod node_state;
pub mod params;
pub mod supervisor;
