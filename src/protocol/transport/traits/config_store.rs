//! Persisted configuration contract: learned events with their event
//! variables, node variables, and the node identity itself.
//!
//! Event records are `4 + evs_per_event` bytes: node number and event number
//! (both big-endian) followed by the event variables. A record whose first
//! four bytes are all `0xFF` is free.
use alloc::vec::Vec;

use crate::core::NodeMode;

/// Size of the key at the start of every event record.
pub const EVENT_KEY_LEN: usize = 4;

/// Storage backing a node's configuration. Implementations are expected to be
/// fast enough to be called from inside a processing tick.
pub trait ConfigStore {
    //==================================================================================EVENTS
    /// Number of event records the store can hold.
    fn event_slots(&self) -> u8;
    /// Event variables per record.
    fn evs_per_event(&self) -> u8;
    /// Index of the record learned for `(node_number, event_number)`.
    fn find_existing_event(&self, node_number: u16, event_number: u16) -> Option<u8>;
    /// Raw record at `index`, `None` when out of range.
    fn read_event(&self, index: u8) -> Option<Vec<u8>>;
    /// Set event variable `ev_index` (1-based) of the event, creating the record if needed.
    fn write_event(&mut self, node_number: u16, event_number: u16, ev_index: u8, value: u8)
        -> bool;
    /// Forget a learned event.
    fn clear_event(&mut self, node_number: u16, event_number: u16) -> bool;
    /// Forget every learned event.
    fn clear_all_events(&mut self);
    /// Number of records in use.
    fn count_events(&self) -> u32;

    //==================================================================================NODE_VARIABLES
    /// Number of node variables (1-based indices up to this value).
    fn nv_count(&self) -> u8;
    fn read_nv(&self, index: u8) -> u8;
    fn write_nv(&mut self, index: u8, value: u8);

    //==================================================================================IDENTITY
    fn mode(&self) -> NodeMode;
    fn set_mode(&mut self, mode: NodeMode);
    fn can_id(&self) -> u8;
    fn set_can_id(&mut self, can_id: u8);
    fn node_number(&self) -> u16;
    fn set_node_number(&mut self, node_number: u16);
}

/// `true` when a raw record is marked free.
pub fn is_free_record(record: &[u8]) -> bool {
    record.len() >= EVENT_KEY_LEN && record[..EVENT_KEY_LEN].iter().all(|b| *b == 0xFF)
}

/// `(node_number, event_number)` key of a raw record.
pub fn record_key(record: &[u8]) -> Option<(u16, u16)> {
    if record.len() < EVENT_KEY_LEN || is_free_record(record) {
        return None;
    }
    Some((
        u16::from_be_bytes([record[0], record[1]]),
        u16::from_be_bytes([record[2], record[3]]),
    ))
}
