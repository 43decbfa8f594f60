//! EBML variable-length integers.
//!
//! The number of leading zero bits in the first byte, plus one, gives the
//! total width in bytes. The marker bit is cleared and the remaining bytes
//! follow big-endian. Element IDs are limited to 4 bytes and keep their
//! marker, element lengths are limited to 8 bytes.

use std::io::{self, Read};

use crate::utils::errors::{DemuxError, Result};

/// Widest element ID accepted.
pub const MAX_ID_WIDTH: usize = 4;

/// Widest element length accepted.
pub const MAX_LENGTH_WIDTH: usize = 8;

/// Sentinel for lengths encoded with every data bit set.
pub const UNKNOWN_LENGTH: u64 = u64::MAX;

/// Total width of a vint from its first byte, `None` when no marker bit is set.
#[inline]
pub fn vint_width(first: u8) -> Option<usize> {
    (first != 0).then(|| first.leading_zeros() as usize + 1)
}

/// Decodes a vint whose first byte has already been read, pulling
/// continuation bytes from `next_byte`.
pub fn decode_vint<F>(first: u8, max_width: usize, pos: u64, mut next_byte: F) -> Result<(u64, usize)>
where
    F: FnMut() -> Result<u8>,
{
    let width = match vint_width(first) {
        Some(width) if width <= max_width => width,
        _ => return Err(DemuxError::InvalidVarint { byte: first, pos }),
    };

    let mut value = u64::from(first) & (0xFF >> width);
    for _ in 1..width {
        value = (value << 8) | u64::from(next_byte()?);
    }

    Ok((value, width))
}

/// True when every data bit of a `width`-byte vint is set.
#[inline]
pub fn is_all_ones(value: u64, width: usize) -> bool {
    value == (1u64 << (7 * width)) - 1
}

/// Puts the marker bit back so IDs compare equal to their written form.
#[inline]
pub fn id_with_marker(value: u64, width: usize) -> u32 {
    (value | (1u64 << (7 * width))) as u32
}

/// Reinterprets an unsigned vint as the signed form used by EBML lacing.
#[inline]
pub fn signed_from_vint(value: u64, width: usize) -> i64 {
    value as i64 - ((1i64 << (7 * width - 1)) - 1)
}

/// Reads one byte, mapping end of input to [`DemuxError::TruncatedStream`].
pub fn read_u8<R: Read>(reader: &mut R, pos: u64) -> Result<u8> {
    let mut byte = [0u8; 1];
    match reader.read_exact(&mut byte) {
        Ok(()) => Ok(byte[0]),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(DemuxError::TruncatedStream(pos)),
        Err(e) => Err(e.into()),
    }
}

/// Reads a vint from a byte stream positioned at `pos`.
pub fn read_vint<R: Read>(reader: &mut R, max_width: usize, pos: u64) -> Result<(u64, usize)> {
    let first = read_u8(reader, pos)?;
    let mut offset = pos;
    decode_vint(first, max_width, pos, || {
        offset += 1;
        read_u8(reader, offset)
    })
}

/// Reads a vint from the start of `buf`.
pub fn vint_from_slice(buf: &[u8], max_width: usize) -> Result<(u64, usize)> {
    let first = *buf.first().ok_or(DemuxError::TruncatedStream(0))?;
    let mut offset = 0;
    decode_vint(first, max_width, 0, || {
        offset += 1;
        buf.get(offset)
            .copied()
            .ok_or(DemuxError::TruncatedStream(offset as u64))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::encode_vint_width;

    #[test]
    fn every_width_round_trips() -> anyhow::Result<()> {
        for width in 1..=8usize {
            let max = (1u64 << (7 * width)) - 2;
            for value in [0, 1, max / 3, max] {
                let bytes = encode_vint_width(value, width);
                assert_eq!(bytes.len(), width);

                let (decoded, consumed) = read_vint(&mut io::Cursor::new(&bytes), 8, 0)?;
                assert_eq!((decoded, consumed), (value, width));
                assert_eq!(vint_from_slice(&bytes, 8)?, (value, width));
            }
        }
        Ok(())
    }

    #[test]
    fn known_encodings() -> anyhow::Result<()> {
        assert_eq!(vint_from_slice(&[0x81], 8)?, (1, 1));
        assert_eq!(vint_from_slice(&[0x40, 0x02], 8)?, (2, 2));
        assert_eq!(vint_from_slice(&[0x1A, 0x45, 0xDF, 0xA3], 4)?, (0x0A45DFA3, 4));
        assert_eq!(id_with_marker(0x0A45DFA3, 4), 0x1A45DFA3);
        assert!(is_all_ones(0x7F, 1));
        assert!(is_all_ones(0xFF_FFFF_FFFF_FFFF, 8));
        Ok(())
    }

    #[test]
    fn width_caps() {
        // 5-byte ID
        assert!(matches!(
            vint_from_slice(&[0x08, 0, 0, 0, 1], MAX_ID_WIDTH),
            Err(DemuxError::InvalidVarint { byte: 0x08, .. })
        ));
        assert!(vint_from_slice(&[0x08, 0, 0, 0, 1], MAX_LENGTH_WIDTH).is_ok());
        assert!(matches!(
            vint_from_slice(&[0x00, 0xFF], MAX_LENGTH_WIDTH),
            Err(DemuxError::InvalidVarint { .. })
        ));
    }

    #[test]
    fn truncated_input() {
        assert!(matches!(
            read_vint(&mut io::Cursor::new([0x20u8, 0x01]), 8, 100),
            Err(DemuxError::TruncatedStream(102))
        ));
        assert!(matches!(
            vint_from_slice(&[], 8),
            Err(DemuxError::TruncatedStream(0))
        ));
    }

    #[test]
    fn signed_deltas() {
        // one byte: 0x3F is the zero point
        assert_eq!(signed_from_vint(0x3F, 1), 0);
        assert_eq!(signed_from_vint(0x40, 1), 1);
        assert_eq!(signed_from_vint(0x3E, 1), -1);
        assert_eq!(signed_from_vint(0x1FFF, 2), 0);
    }
}
