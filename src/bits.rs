//! Bit-level payload packing.
//!
//! ScienceMode packs many fields at sub-byte granularity (10-bit commands,
//! 6-bit packet numbers, 12-bit durations). [`ByteBuilder`] is a growable
//! bit-addressable buffer: bit `i` lives in byte `i / 8` at bit `i % 8`,
//! LSB-first, and the final partial byte is zero-padded on flatten.

/// Growable LSB-first bit buffer with byte-level convenience operations.
#[derive(Debug, Clone, Default)]
pub struct ByteBuilder {
    data: Vec<u8>,
    bit_len: usize,
}

impl ByteBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder seeded with the low `byte_count` bytes of `value`,
    /// least significant byte first.
    pub fn from_value(value: u64, byte_count: usize) -> Self {
        let mut bb = Self::new();
        for i in 0..byte_count {
            bb.append_byte((value >> (i * 8)) as u8);
        }
        bb
    }

    /// Current length in bits.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Current length in whole bytes (partial final byte counts as one).
    pub fn byte_len(&self) -> usize {
        self.bit_len.div_ceil(8)
    }

    /// Read `bit_count` bits (≤ 32) starting at `bit_pos`, LSB-first.
    ///
    /// Panics if the range was never set — reading past the end is a
    /// programmer error, not a recoverable condition.
    pub fn get_bits(&self, bit_pos: usize, bit_count: usize) -> u32 {
        assert!(bit_count <= 32, "bit count {bit_count} exceeds 32");
        assert!(
            bit_pos + bit_count <= self.bit_len,
            "bit range {bit_pos}+{bit_count} out of bounds (len {})",
            self.bit_len
        );
        let mut value = 0u32;
        for x in 0..bit_count {
            let i = bit_pos + x;
            let bit = (self.data[i / 8] >> (i % 8)) & 1;
            value |= u32::from(bit) << x;
        }
        value
    }

    /// Write the low `bit_count` bits (≤ 32) of `value` starting at `bit_pos`,
    /// LSB-first. Extends the buffer to at least `bit_pos + bit_count` bits;
    /// never truncates, and previously set bits outside the range are kept.
    pub fn set_bits(&mut self, value: u32, bit_pos: usize, bit_count: usize) {
        assert!(bit_count <= 32, "bit count {bit_count} exceeds 32");
        self.reserve_bits(bit_pos + bit_count);
        for x in 0..bit_count {
            let i = bit_pos + x;
            let mask = 1u8 << (i % 8);
            if (value >> x) & 1 == 1 {
                self.data[i / 8] |= mask;
            } else {
                self.data[i / 8] &= !mask;
            }
        }
    }

    /// Append one byte at the current end.
    pub fn append_byte(&mut self, value: u8) {
        let pos = self.bit_len;
        self.set_bits(u32::from(value), pos, 8);
    }

    /// Append a byte slice at the current end.
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.append_byte(b);
        }
    }

    /// Append the low `byte_count` bytes of `value`; most significant byte
    /// first when `big_endian` is set, least significant first otherwise.
    pub fn append_value(&mut self, value: u64, byte_count: usize, big_endian: bool) {
        if big_endian {
            for i in (0..byte_count).rev() {
                self.append_byte((value >> (i * 8)) as u8);
            }
        } else {
            for i in 0..byte_count {
                self.append_byte((value >> (i * 8)) as u8);
            }
        }
    }

    /// Reverse the byte order of `[start_byte, start_byte + byte_count)`.
    ///
    /// Used to convert a field's natural LSB-first packing into wire
    /// big-endian order.
    pub fn swap_range(&mut self, start_byte: usize, byte_count: usize) {
        assert!(
            (start_byte + byte_count) * 8 <= self.bit_len.next_multiple_of(8),
            "swap range {start_byte}+{byte_count} out of bounds (len {} bytes)",
            self.byte_len()
        );
        self.data[start_byte..start_byte + byte_count].reverse();
    }

    /// Flatten to bytes, zero-padding the final partial byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data[..self.byte_len()].to_vec()
    }

    fn reserve_bits(&mut self, bits: usize) {
        if bits > self.bit_len {
            self.bit_len = bits;
            self.data.resize(self.bit_len.div_ceil(8), 0);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_round_trip() {
        let mut bb = ByteBuilder::new();
        bb.set_bits(0b1011, 0, 4);
        assert_eq!(bb.get_bits(0, 4), 0b1011);
        assert_eq!(bb.bit_len(), 4);
    }

    #[test]
    fn set_beyond_end_extends_without_corruption() {
        let mut bb = ByteBuilder::new();
        bb.set_bits(0b1011, 0, 4);
        bb.set_bits(0x3FF, 20, 10);
        assert_eq!(bb.get_bits(0, 4), 0b1011);
        assert_eq!(bb.get_bits(20, 10), 0x3FF);
        // Gap bits are zero.
        assert_eq!(bb.get_bits(4, 16), 0);
        assert_eq!(bb.bit_len(), 30);
    }

    #[test]
    fn overwrite_clears_old_bits() {
        let mut bb = ByteBuilder::new();
        bb.set_bits(0xFF, 0, 8);
        bb.set_bits(0x00, 2, 4);
        assert_eq!(bb.get_bits(0, 8), 0b1100_0011);
    }

    #[test]
    fn command_number_header_packing() {
        // 10 bits command + 6 bits number, swapped to wire order — the frame
        // header layout.
        let mut bb = ByteBuilder::new();
        bb.set_bits(52, 0, 10);
        bb.set_bits(1, 10, 6);
        bb.swap_range(0, 2);
        let wire = bb.to_bytes();
        assert_eq!(wire.len(), 2);

        let mut back = ByteBuilder::new();
        back.append_bytes(&wire);
        back.swap_range(0, 2);
        assert_eq!(back.get_bits(0, 10), 52);
        assert_eq!(back.get_bits(10, 6), 1);
    }

    #[test]
    fn append_byte_packs_lsb_first() {
        let mut bb = ByteBuilder::new();
        bb.append_byte(0xA5);
        bb.append_byte(0x01);
        assert_eq!(bb.to_bytes(), vec![0xA5, 0x01]);
        assert_eq!(bb.get_bits(0, 8), 0xA5);
        assert_eq!(bb.get_bits(8, 8), 0x01);
    }

    #[test]
    fn append_value_endianness() {
        let mut bb = ByteBuilder::new();
        bb.append_value(0x0102_0304, 4, true);
        assert_eq!(bb.to_bytes(), vec![0x01, 0x02, 0x03, 0x04]);

        let mut bb = ByteBuilder::new();
        bb.append_value(0x0102_0304, 4, false);
        assert_eq!(bb.to_bytes(), vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn partial_byte_zero_padded() {
        let mut bb = ByteBuilder::new();
        bb.set_bits(0b101, 0, 3);
        assert_eq!(bb.to_bytes(), vec![0b0000_0101]);
    }

    #[test]
    fn from_value_seeds_bytes() {
        let bb = ByteBuilder::from_value(0xBEEF, 2);
        assert_eq!(bb.to_bytes(), vec![0xEF, 0xBE]);
    }

    #[test]
    #[should_panic]
    fn get_out_of_range_panics() {
        let bb = ByteBuilder::new();
        let _ = bb.get_bits(0, 1);
    }
}
