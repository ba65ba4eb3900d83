//! CRC-16/XMODEM over the stuffed frame body.
//!
//! Polynomial 0x1021, initial value 0x0000, no final XOR, MSB-first per byte.
//! The device computes the same checksum, so this must stay bit-exact.

/// Compute the CRC-16/XMODEM checksum of `data`.
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_check_value() {
        // CRC catalogue check value for CRC-16/XMODEM.
        assert_eq!(crc16_xmodem(b"123456789"), 0x31C3);
    }

    #[test]
    fn empty_input() {
        assert_eq!(crc16_xmodem(b""), 0x0000);
    }

    #[test]
    fn single_byte() {
        // 'A' = 0x41 processed through the 0x1021 polynomial.
        assert_eq!(crc16_xmodem(b"A"), 0x58E5);
    }

    #[test]
    fn order_sensitive() {
        assert_ne!(crc16_xmodem(&[0x01, 0x02]), crc16_xmodem(&[0x02, 0x01]));
    }
}
