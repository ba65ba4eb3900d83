//! Frame encoding, byte stuffing, CRC validation, and stream scanning.
//!
//! Wire format:
//! ```text
//! F0 STUFFED(LEN_HI) STUFFED(LEN_LO) STUFFED(CRC_HI) STUFFED(CRC_LO) STUFFED( CMD|NUM PAYLOAD... ) 0F
//! ```
//!
//! The four header fields are *always* stuffed (one `81 xx` pair per raw
//! byte), so a genuine frame begins with exactly `F0 81` and the CRC bytes
//! sit at fixed wire offsets 6 and 8. The CRC covers the stuffed body only.
//! The 16-bit header packs a 10-bit command and a 6-bit packet number,
//! byte-swapped to wire order; inside the stuffed body it may occupy 2 to 4
//! wire bytes depending on whether either raw byte is itself reserved.

use crate::bits::ByteBuilder;
use crate::crc::crc16_xmodem;
use crate::error::{ProtocolError, Result};

/// Frame start marker.
pub const START: u8 = 0xF0;
/// Frame stop marker.
pub const STOP: u8 = 0x0F;
/// Escape marker introducing a stuffed byte.
pub const ESCAPE: u8 = 0x81;
/// XOR key applied to the byte following an escape marker.
const KEY: u8 = 0x55;

/// Fixed frame overhead added to the stuffed body length: start + stuffed
/// length + stuffed CRC + stop.
const FRAME_OVERHEAD: usize = 10;
/// Offset of the stuffed body within a frame.
const BODY_OFFSET: usize = 9;
/// Smallest possible frame: overhead plus a 2-byte unstuffed header.
const MIN_FRAME_LEN: usize = 12;

// ---------------------------------------------------------------------------
// Byte stuffing
// ---------------------------------------------------------------------------

/// Stuff a single byte unconditionally: `[ESCAPE, KEY ^ b]`.
pub fn stuff_byte(b: u8) -> [u8; 2] {
    [ESCAPE, KEY ^ b]
}

/// Recover the raw byte from the second byte of an escape pair.
pub fn unstuff_byte(b: u8) -> u8 {
    KEY ^ b
}

/// Byte-stuff a slice: escape START, STOP, and ESCAPE; pass everything else.
pub fn stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        match b {
            START | STOP | ESCAPE => out.extend_from_slice(&stuff_byte(b)),
            _ => out.push(b),
        }
    }
    out
}

/// Reverse [`stuff`]: resolve every escape pair back to its raw byte.
pub fn unstuff(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == ESCAPE {
            if i + 1 >= data.len() {
                return Err(ProtocolError::TruncatedEscape { offset: i });
            }
            out.push(unstuff_byte(data[i + 1]));
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Frame encode
// ---------------------------------------------------------------------------

/// Encode a command, packet number, and payload into a complete wire frame.
///
/// `command` must fit in 10 bits and `number` in 6.
pub fn encode(command: u16, number: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(command < 1024, "command {command} exceeds 10 bits");
    debug_assert!(number < 64, "packet number {number} exceeds 6 bits");

    // 10 bits command + 6 bits number, byte-swapped to wire order.
    let mut bb = ByteBuilder::new();
    bb.set_bits(u32::from(command), 0, 10);
    bb.set_bits(u32::from(number), 10, 6);
    bb.swap_range(0, 2);
    bb.append_bytes(payload);
    let stuffed_body = stuff(&bb.to_bytes());

    let length = (stuffed_body.len() + FRAME_OVERHEAD) as u16;
    let crc = crc16_xmodem(&stuffed_body);

    let mut wire = Vec::with_capacity(stuffed_body.len() + FRAME_OVERHEAD);
    wire.push(START);
    wire.extend_from_slice(&stuff_byte((length >> 8) as u8));
    wire.extend_from_slice(&stuff_byte(length as u8));
    wire.extend_from_slice(&stuff_byte((crc >> 8) as u8));
    wire.extend_from_slice(&stuff_byte(crc as u8));
    wire.extend_from_slice(&stuffed_body);
    wire.push(STOP);
    wire
}

// ---------------------------------------------------------------------------
// Frame detection
// ---------------------------------------------------------------------------

/// Check whether `buf` holds a structurally valid frame: delimiters in place
/// and the embedded CRC matching the stuffed body.
pub fn is_valid_frame(buf: &[u8]) -> bool {
    if buf.len() < MIN_FRAME_LEN || buf[0] != START || buf[buf.len() - 1] != STOP {
        return false;
    }
    // Header fields are single-stuffed, so the CRC payload bytes sit at
    // fixed wire offsets 6 and 8.
    let crc = (u16::from(unstuff_byte(buf[6])) << 8) | u16::from(unstuff_byte(buf[8]));
    crc == crc16_xmodem(&buf[BODY_OFFSET..buf.len() - 1])
}

/// Find the first valid frame in `buf`, returning its inclusive
/// `(start, stop)` byte bounds.
///
/// A genuine frame always begins with `F0 81` (the length-high byte is
/// explicitly stuffed), so a lone 0xF0 in noise or sample data never starts
/// a match. Candidates failing CRC validation are skipped and the scan
/// resumes behind their stop byte. Returns `None` when no complete valid
/// frame is present yet; the caller should wait for more bytes.
pub fn find_frame(buf: &[u8]) -> Option<(usize, usize)> {
    let mut from = 0;
    loop {
        let start = buf[from..]
            .windows(2)
            .position(|w| w == [START, ESCAPE])?
            + from;

        // A stop marker can appear no earlier than the minimal frame length.
        let stop_from = start + MIN_FRAME_LEN - 1;
        if stop_from >= buf.len() {
            return None;
        }
        let stop = match buf[stop_from..].iter().position(|&b| b == STOP) {
            Some(p) => stop_from + p,
            None => return None,
        };

        if is_valid_frame(&buf[start..=stop]) {
            return Some((start, stop));
        }
        from = stop;
    }
}

// ---------------------------------------------------------------------------
// Frame extraction
// ---------------------------------------------------------------------------

/// Extract `(command, number, payload)` from a valid frame.
///
/// The 2 logical header bytes occupy 2 to 4 wire bytes because each may be
/// individually stuffed; the header boundary is discovered by unstuffing
/// incrementally, never by assuming a fixed width.
pub fn extract(frame: &[u8]) -> Result<(u16, u8, Vec<u8>)> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::FrameTooShort { len: frame.len() });
    }
    if frame[0] != START {
        return Err(ProtocolError::MissingStart { got: frame[0] });
    }
    if frame[frame.len() - 1] != STOP {
        return Err(ProtocolError::MissingStop);
    }

    let body = &frame[BODY_OFFSET..frame.len() - 1];
    let mut header_wire = 0;
    for _ in 0..2 {
        match body.get(header_wire) {
            Some(&ESCAPE) if header_wire + 2 <= body.len() => header_wire += 2,
            Some(&ESCAPE) | None => {
                return Err(ProtocolError::TruncatedEscape { offset: BODY_OFFSET + header_wire });
            }
            Some(_) => header_wire += 1,
        }
    }

    let mut bb = ByteBuilder::new();
    bb.append_bytes(&unstuff(&body[..header_wire])?);
    bb.swap_range(0, 2);
    let command = bb.get_bits(0, 10) as u16;
    let number = bb.get_bits(10, 6) as u8;
    let payload = unstuff(&body[header_wire..])?;

    Ok((command, number, payload))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuff_round_trip() {
        let data = [0x00, 0xF0, 0x0F, 0x81, 0x55, 0xFF, 0xF0, 0xF0];
        let stuffed = stuff(&data);
        // 5 reserved occurrences, 2 bytes each.
        assert_eq!(stuffed.len(), data.len() + 5);
        assert_eq!(unstuff(&stuffed).unwrap(), data);
    }

    #[test]
    fn stuff_byte_inverse() {
        for b in 0..=255u8 {
            let [esc, stuffed] = stuff_byte(b);
            assert_eq!(esc, ESCAPE);
            assert_eq!(unstuff_byte(stuffed), b);
        }
    }

    #[test]
    fn unstuff_truncated_escape() {
        assert!(matches!(
            unstuff(&[0x01, ESCAPE]),
            Err(ProtocolError::TruncatedEscape { offset: 1 })
        ));
    }

    #[test]
    fn encode_starts_with_stuffed_length() {
        let wire = encode(52, 1, &[]);
        assert_eq!(wire[0], START);
        assert_eq!(wire[1], ESCAPE);
        assert_eq!(*wire.last().unwrap(), STOP);
        // Empty payload, unstuffed header: 12 bytes total, length field 12.
        assert_eq!(wire.len(), 12);
        assert_eq!(unstuff_byte(wire[2]), 0);
        assert_eq!(unstuff_byte(wire[4]), 12);
    }

    #[test]
    fn frame_round_trip() {
        for (command, number, payload) in [
            (52u16, 1u8, vec![]),
            (0, 0, vec![0x00]),
            (1023, 63, vec![0xF0, 0x0F, 0x81, 0x55]),
            (107, 17, (0..=255).collect::<Vec<u8>>()),
        ] {
            let wire = encode(command, number, &payload);
            assert!(is_valid_frame(&wire));
            let (c, n, p) = extract(&wire).unwrap();
            assert_eq!((c, n, p), (command, number, payload));
        }
    }

    #[test]
    fn double_stuffed_header_round_trip() {
        // Command 1008, number 3 packs to wire header bytes [0x0F, 0xF0] —
        // both reserved, so the header occupies 4 stuffed wire bytes.
        let wire = encode(1008, 3, &[0xAA]);
        assert!(is_valid_frame(&wire));
        let (c, n, p) = extract(&wire).unwrap();
        assert_eq!((c, n), (1008, 3));
        assert_eq!(p, vec![0xAA]);
    }

    #[test]
    fn dangling_escape_in_header_is_an_error() {
        // A CRC-valid frame whose body ends mid escape pair: the CRC covers
        // the stuffed body as-is, so corrupt device output can produce one.
        // Header extraction must refuse it, not read past the body.
        let body = [0x00, ESCAPE];
        let length = (body.len() + 10) as u16;
        let crc = crc16_xmodem(&body);
        let mut wire = vec![START];
        wire.extend_from_slice(&stuff_byte((length >> 8) as u8));
        wire.extend_from_slice(&stuff_byte(length as u8));
        wire.extend_from_slice(&stuff_byte((crc >> 8) as u8));
        wire.extend_from_slice(&stuff_byte(crc as u8));
        wire.extend_from_slice(&body);
        wire.push(STOP);

        assert!(is_valid_frame(&wire));
        assert!(matches!(
            extract(&wire),
            Err(ProtocolError::TruncatedEscape { offset: 10 })
        ));
    }

    #[test]
    fn find_frame_ignores_noise() {
        let frame = encode(63, 5, &[0x01, 0x02]);
        let mut stream = vec![0xF0, 0x00, 0x0F, 0x81, 0x42]; // stray markers
        let start = stream.len();
        stream.extend_from_slice(&frame);
        stream.extend_from_slice(&[0xF0, 0x0F, 0x42]);

        let (s, e) = find_frame(&stream).unwrap();
        assert_eq!(s, start);
        assert_eq!(e, start + frame.len() - 1);
        assert_eq!(&stream[s..=e], &frame[..]);
    }

    #[test]
    fn find_frame_incomplete_returns_none() {
        let frame = encode(63, 5, &[0x01, 0x02]);
        assert!(find_frame(&frame[..frame.len() - 1]).is_none());
        assert!(find_frame(&[]).is_none());
    }

    #[test]
    fn find_frame_skips_corrupted_candidate() {
        let mut bad = encode(63, 5, &[0x01]);
        let payload_at = bad.len() - 2;
        bad[payload_at] ^= 0x01; // 0x01 -> 0x00, CRC no longer matches
        let good = encode(31, 9, &[0x07]);
        let mut stream = bad.clone();
        stream.extend_from_slice(&good);

        let (s, e) = find_frame(&stream).unwrap();
        assert_eq!(s, bad.len());
        assert_eq!(&stream[s..=e], &good[..]);
    }

    #[test]
    fn back_to_back_frames_first_wins() {
        let first = encode(1, 1, &[]);
        let second = encode(3, 2, &[]);
        let mut stream = first.clone();
        stream.extend_from_slice(&second);
        let (s, e) = find_frame(&stream).unwrap();
        assert_eq!((s, e), (0, first.len() - 1));
    }

    #[test]
    fn crc_covers_stuffed_body() {
        let mut wire = encode(63, 5, &[0x01, 0x02]);
        let last_body = wire.len() - 2;
        wire[last_body] ^= 0x01;
        assert!(!is_valid_frame(&wire));
    }
}
