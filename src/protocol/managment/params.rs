//! Node parameter block answered to `RQNP` and `RQNPN`.
//!
//! Parameters are 1-based; index 0 reports how many there are.

/// Number of parameters exposed (indices 1..=PARAM_COUNT).
pub const PARAM_COUNT: u8 = 20;

/// Flag bits carried by parameter 8.
pub mod flags {
    pub const CONSUMER: u8 = 0x01;
    pub const PRODUCER: u8 = 0x02;
    pub const FLIM: u8 = 0x04;
    pub const BOOTLOADER: u8 = 0x08;
    pub const CONSUME_OWN_EVENTS: u8 = 0x10;
    pub const LEARN: u8 = 0x20;
}

/// Static module description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeParams {
    pub manufacturer: u8,
    pub minor_version: u8,
    pub module_id: u8,
    pub num_events: u8,
    pub evs_per_event: u8,
    pub num_nvs: u8,
    pub major_version: u8,
    /// Base flags; the FLiM and learn bits are maintained by the node.
    pub flags: u8,
    pub processor_id: u8,
    /// Interface protocol: 1 for CAN.
    pub interface: u8,
    pub beta: u8,
}

impl Default for NodeParams {
    fn default() -> Self {
        Self {
            manufacturer: 165,
            minor_version: b'a',
            module_id: 0xFF,
            num_events: 0,
            evs_per_event: 0,
            num_nvs: 0,
            major_version: 1,
            flags: flags::CONSUMER | flags::PRODUCER,
            processor_id: 50,
            interface: 1,
            beta: 0,
        }
    }
}

impl NodeParams {
    /// Parameter `index`; `None` past [`PARAM_COUNT`].
    ///
    /// `flags` is the live value of parameter 8.
    pub fn get(&self, index: u8, flags: u8) -> Option<u8> {
        let value = match index {
            0 => PARAM_COUNT,
            1 => self.manufacturer,
            2 => self.minor_version,
            3 => self.module_id,
            4 => self.num_events,
            5 => self.evs_per_event,
            6 => self.num_nvs,
            7 => self.major_version,
            8 => flags,
            9 => self.processor_id,
            10 => self.interface,
            // Load address, processor signature and code, not meaningful off-chip.
            11..=19 => 0,
            20 => self.beta,
            _ => return None,
        };
        Some(value)
    }

    /// Copy with parameters 4-6 taken from the store sizes where left at 0.
    pub fn with_store_sizes(mut self, num_events: u8, evs_per_event: u8, num_nvs: u8) -> Self {
        if self.num_events == 0 {
            self.num_events = num_events;
        }
        if self.evs_per_event == 0 {
            self.evs_per_event = evs_per_event;
        }
        if self.num_nvs == 0 {
            self.num_nvs = num_nvs;
        }
        self
    }

    /// Parameters 1..=7 as carried by `PARAMS`.
    pub fn summary(&self) -> [u8; 7] {
        [
            self.manufacturer,
            self.minor_version,
            self.module_id,
            self.num_events,
            self.evs_per_event,
            self.num_nvs,
            self.major_version,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_zero_is_count() {
        let params = NodeParams::default();
        assert_eq!(params.get(0, 0), Some(PARAM_COUNT));
        assert_eq!(params.get(PARAM_COUNT + 1, 0), None);
        assert_eq!(params.get(8, 0x07), Some(0x07));
        assert_eq!(params.get(1, 0), Some(165));
    }

    #[test]
    fn test_store_sizes_fill_unset_counts() {
        let params = NodeParams::default().with_store_sizes(32, 4, 8);
        assert_eq!(params.summary()[3..6], [32, 4, 8]);

        let fixed = NodeParams {
            num_nvs: 2,
            ..NodeParams::default()
        }
        .with_store_sizes(32, 4, 8);
        assert_eq!(fixed.get(6, 0), Some(2));
        assert_eq!(fixed.get(4, 0), Some(32));
    }
}
