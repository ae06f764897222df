//! CRC-16/CCITT in its reflected form (polynomial 0x8408, init 0xFFFF,
//! final complement), as carried in long-message header fragments.

const POLY: u16 = 0x8408;

/// Compute the checksum over a whole payload.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        let mut bits = byte;
        for _ in 0..8 {
            if (crc ^ bits as u16) & 0x0001 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
            bits >>= 1;
        }
    }
    !crc
}
