//! RAM-backed [`ConfigStore`]: a flat image laid out like the EEPROM of a
//! real module. Useful for hosts, bridges and tests; nothing survives a restart.
use alloc::vec;
use alloc::vec::Vec;

use crate::core::NodeMode;
use crate::protocol::transport::traits::config_store::{
    is_free_record, record_key, ConfigStore, EVENT_KEY_LEN,
};

/// In-memory configuration image.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    events: Vec<u8>,
    event_slots: u8,
    evs_per_event: u8,
    nvs: Vec<u8>,
    mode: NodeMode,
    can_id: u8,
    node_number: u16,
}

impl MemoryStore {
    /// Fresh store: every event record free, every NV zero, SLIM identity.
    pub fn new(event_slots: u8, evs_per_event: u8, nv_count: u8) -> Self {
        let record_len = EVENT_KEY_LEN + evs_per_event as usize;
        Self {
            events: vec![0xFF; record_len * event_slots as usize],
            event_slots,
            evs_per_event,
            nvs: vec![0; nv_count as usize],
            mode: NodeMode::Slim,
            can_id: 0,
            node_number: 0,
        }
    }

    /// Pre-load a persisted identity.
    pub fn with_identity(mut self, mode: NodeMode, can_id: u8, node_number: u16) -> Self {
        self.mode = mode;
        self.can_id = can_id;
        self.node_number = node_number;
        self
    }

    fn record_len(&self) -> usize {
        EVENT_KEY_LEN + self.evs_per_event as usize
    }

    fn record(&self, index: u8) -> Option<&[u8]> {
        let len = self.record_len();
        let start = index as usize * len;
        self.events.get(start..start + len)
    }

    fn record_mut(&mut self, index: u8) -> Option<&mut [u8]> {
        let len = self.record_len();
        let start = index as usize * len;
        self.events.get_mut(start..start + len)
    }

    fn free_slot(&self) -> Option<u8> {
        (0..self.event_slots).find(|i| self.record(*i).is_some_and(is_free_record))
    }
}

impl ConfigStore for MemoryStore {
    fn event_slots(&self) -> u8 {
        self.event_slots
    }

    fn evs_per_event(&self) -> u8 {
        self.evs_per_event
    }

    fn find_existing_event(&self, node_number: u16, event_number: u16) -> Option<u8> {
        (0..self.event_slots).find(|i| {
            self.record(*i).and_then(record_key) == Some((node_number, event_number))
        })
    }

    fn read_event(&self, index: u8) -> Option<Vec<u8>> {
        self.record(index).map(|r| r.to_vec())
    }

    fn write_event(
        &mut self,
        node_number: u16,
        event_number: u16,
        ev_index: u8,
        value: u8,
    ) -> bool {
        if ev_index == 0 || ev_index > self.evs_per_event {
            return false;
        }
        let index = match self
            .find_existing_event(node_number, event_number)
            .or_else(|| self.free_slot())
        {
            Some(index) => index,
            None => return false,
        };
        let Some(record) = self.record_mut(index) else {
            return false;
        };
        if is_free_record(record) {
            record[..2].copy_from_slice(&node_number.to_be_bytes());
            record[2..4].copy_from_slice(&event_number.to_be_bytes());
            record[EVENT_KEY_LEN..].fill(0);
        }
        record[EVENT_KEY_LEN + ev_index as usize - 1] = value;
        true
    }

    fn clear_event(&mut self, node_number: u16, event_number: u16) -> bool {
        match self.find_existing_event(node_number, event_number) {
            Some(index) => {
                if let Some(record) = self.record_mut(index) {
                    record.fill(0xFF);
                }
                true
            }
            None => false,
        }
    }

    fn clear_all_events(&mut self) {
        self.events.fill(0xFF);
    }

    fn count_events(&self) -> u32 {
        (0..self.event_slots)
            .filter(|i| self.record(*i).is_some_and(|r| !is_free_record(r)))
            .count() as u32
    }

    fn nv_count(&self) -> u8 {
        self.nvs.len() as u8
    }

    fn read_nv(&self, index: u8) -> u8 {
        index
            .checked_sub(1)
            .and_then(|i| self.nvs.get(i as usize))
            .copied()
            .unwrap_or(0)
    }

    fn write_nv(&mut self, index: u8, value: u8) {
        if let Some(slot) = index
            .checked_sub(1)
            .and_then(|i| self.nvs.get_mut(i as usize))
        {
            *slot = value;
        }
    }

    fn mode(&self) -> NodeMode {
        self.mode
    }

    fn set_mode(&mut self, mode: NodeMode) {
        self.mode = mode;
    }

    fn can_id(&self) -> u8 {
        self.can_id
    }

    fn set_can_id(&mut self, can_id: u8) {
        self.can_id = can_id;
    }

    fn node_number(&self) -> u16 {
        self.node_number
    }

    fn set_node_number(&mut self, node_number: u16) {
        self.node_number = node_number;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learn_and_find() {
        let mut store = MemoryStore::new(4, 2, 8);
        assert_eq!(store.count_events(), 0);
        assert!(store.write_event(22, 25, 1, 7));
        assert!(store.write_event(22, 25, 2, 9));

        let index = store.find_existing_event(22, 25).unwrap();
        assert_eq!(store.read_event(index).unwrap(), [0, 22, 0, 25, 7, 9]);
        assert_eq!(store.count_events(), 1);
    }

    #[test]
    fn test_clear_restores_free_marker() {
        let mut store = MemoryStore::new(2, 1, 0);
        store.write_event(1, 1, 1, 1);
        assert!(store.clear_event(1, 1));
        assert!(!store.clear_event(1, 1));
        assert!(is_free_record(&store.read_event(0).unwrap()));
    }

    #[test]
    fn test_full_table_and_bad_ev_index() {
        let mut store = MemoryStore::new(1, 1, 0);
        assert!(store.write_event(1, 1, 1, 1));
        assert!(!store.write_event(1, 2, 1, 1));
        assert!(!store.write_event(1, 1, 2, 1));
        assert!(!store.write_event(1, 1, 0, 1));
    }

    #[test]
    fn test_node_variables_are_one_based() {
        let mut store = MemoryStore::new(0, 0, 3);
        store.write_nv(1, 10);
        store.write_nv(3, 30);
        store.write_nv(4, 40);
        assert_eq!(store.read_nv(1), 10);
        assert_eq!(store.read_nv(3), 30);
        assert_eq!(store.read_nv(0), 0);
        assert_eq!(store.read_nv(4), 0);
    }
}
