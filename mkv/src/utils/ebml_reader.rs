//! Element cursor over an EBML byte stream.
//!
//! Keeps a stack of open master elements as `(start, length)` pairs and a
//! one-element lookahead. A level is closed implicitly as soon as the
//! offset of the next element reaches its end, so parsers loop with
//! [`EbmlReader::next_child`] until it reports that their own level closed.

use std::io::{self, Read, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};

use log::{error, trace};

use crate::utils::errors::{DemuxError, Result};
use crate::utils::vint::{
    MAX_ID_WIDTH, MAX_LENGTH_WIDTH, UNKNOWN_LENGTH, decode_vint, id_with_marker, is_all_ones,
    read_u8, read_vint,
};

/// Maximum number of simultaneously open master elements.
pub const EBML_MAX_DEPTH: usize = 16;

/// One open master element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    /// Offset of the first payload byte.
    pub start: u64,
    /// Payload length, [`UNKNOWN_LENGTH`] when unbounded.
    pub length: u64,
}

impl Level {
    #[inline]
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.length)
    }
}

/// ID and length of an element whose header has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    pub id: u32,
    /// Offset of the first ID byte.
    pub pos: u64,
    /// Offset of the first payload byte.
    pub data_start: u64,
    pub length: u64,
}

/// A master element that has been opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Master {
    pub id: u32,
    pub pos: u64,
    /// Stack depth its children are read at.
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PeekedId {
    id: u32,
    width: usize,
}

#[derive(Debug)]
pub struct EbmlReader<R> {
    inner: R,
    pos: u64,
    levels: Vec<Level>,
    peeked: Option<PeekedId>,
    lost: bool,
}

impl<R: Read + Seek> EbmlReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self {
            inner,
            pos,
            levels: Vec::with_capacity(EBML_MAX_DEPTH),
            peeked: None,
            lost: false,
        })
    }

    /// Offset of the underlying stream.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Offset of the next element, including an already peeked ID.
    pub fn element_start(&self) -> u64 {
        self.pos - self.peeked.map_or(0, |p| p.width as u64)
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn check_lost(&self) -> Result<()> {
        if self.lost {
            return Err(DemuxError::Io(io::Error::other(
                "stream position was lost while restoring after a side parse",
            )));
        }
        Ok(())
    }

    fn sync_position(&mut self) -> Result<()> {
        self.pos = self.inner.stream_position()?;
        Ok(())
    }

    /// Pops every level ending at or before the next element.
    fn close_levels(&mut self) -> usize {
        let offset = self.element_start();
        let mut closed = 0;
        while let Some(level) = self.levels.last() {
            if level.end() > offset {
                break;
            }
            trace!("Closing level {} ending at {}", self.levels.len(), level.end());
            self.levels.pop();
            closed += 1;
        }
        closed
    }

    fn fill_peek(&mut self) -> Result<PeekedId> {
        let start = self.pos;
        let first = match read_u8(&mut self.inner, start) {
            Ok(byte) => byte,
            Err(DemuxError::TruncatedStream(_)) => return Err(DemuxError::EndOfStream),
            Err(e) => return Err(e),
        };

        let inner = &mut self.inner;
        let mut offset = start;
        let decoded = decode_vint(first, MAX_ID_WIDTH, start, || {
            offset += 1;
            read_u8(inner, offset)
        });

        match decoded {
            Ok((value, width)) => {
                let peeked = PeekedId {
                    id: id_with_marker(value, width),
                    width,
                };
                self.pos = start + width as u64;
                self.peeked = Some(peeked);
                Ok(peeked)
            }
            Err(e) => {
                self.sync_position()?;
                Err(e)
            }
        }
    }

    /// Returns the next element ID without consuming it, together with the
    /// number of levels that closed before it.
    pub fn peek_id(&mut self) -> Result<(u32, usize)> {
        self.check_lost()?;
        let closed = self.close_levels();
        let peeked = match self.peeked {
            Some(peeked) => peeked,
            None => self.fill_peek()?,
        };
        Ok((peeked.id, closed))
    }

    /// Next child ID of the master open at `depth`, `None` once it closed.
    pub fn next_child(&mut self, depth: usize) -> Result<Option<u32>> {
        self.close_levels();
        if self.levels.len() < depth {
            return Ok(None);
        }
        self.peek_id().map(|(id, _)| Some(id))
    }

    fn read_header(&mut self) -> Result<ElementHeader> {
        self.check_lost()?;
        let pos = self.element_start();
        let id = match self.peeked.take() {
            Some(peeked) => peeked.id,
            None => {
                let peeked = self.fill_peek()?;
                self.peeked = None;
                peeked.id
            }
        };

        let (value, width) = match read_vint(&mut self.inner, MAX_LENGTH_WIDTH, self.pos) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.sync_position()?;
                return Err(e);
            }
        };
        self.pos += width as u64;

        let length = if is_all_ones(value, width) {
            UNKNOWN_LENGTH
        } else {
            value
        };

        if length != UNKNOWN_LENGTH {
            if let Some(parent) = self.levels.last() {
                match self.pos.checked_add(length) {
                    Some(end) if end <= parent.end() => {}
                    _ => return Err(DemuxError::ElementOverflow { id, pos }),
                }
            }
        }

        Ok(ElementHeader {
            id,
            pos,
            data_start: self.pos,
            length,
        })
    }

    fn invalid_size(header: &ElementHeader) -> DemuxError {
        DemuxError::InvalidElementSize {
            id: header.id,
            size: header.length,
            pos: header.pos,
        }
    }

    fn read_leaf_header(&mut self) -> Result<ElementHeader> {
        let header = self.read_header()?;
        if header.length == UNKNOWN_LENGTH {
            return Err(Self::invalid_size(&header));
        }
        Ok(header)
    }

    fn skip_payload(&mut self, header: &ElementHeader) -> Result<()> {
        let end = header.data_start + header.length;
        self.inner.seek(SeekFrom::Start(end))?;
        self.pos = end;
        Ok(())
    }

    fn read_payload_into(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(DemuxError::TruncatedStream(self.pos))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_payload(&mut self, length: u64) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let read = (&mut self.inner).take(length).read_to_end(&mut data)?;
        self.pos += read as u64;
        if (read as u64) < length {
            return Err(DemuxError::TruncatedStream(self.pos));
        }
        Ok(data)
    }

    /// Reads up to 8 big-endian payload bytes, right-aligned.
    fn read_int_bytes(&mut self) -> Result<(u64, usize)> {
        let header = self.read_leaf_header()?;
        if !(1..=8).contains(&header.length) {
            self.skip_payload(&header)?;
            return Err(Self::invalid_size(&header));
        }

        let len = header.length as usize;
        let mut buf = [0u8; 8];
        self.read_payload_into(&mut buf[8 - len..])?;
        Ok((u64::from_be_bytes(buf), len))
    }

    pub fn read_uint(&mut self) -> Result<u64> {
        self.read_int_bytes().map(|(value, _)| value)
    }

    pub fn read_sint(&mut self) -> Result<i64> {
        let (value, len) = self.read_int_bytes()?;
        let shift = 64 - 8 * len as u32;
        Ok(((value << shift) as i64) >> shift)
    }

    /// Nanoseconds since 2001-01-01T00:00:00 UTC.
    pub fn read_date(&mut self) -> Result<i64> {
        self.read_sint()
    }

    pub fn read_float(&mut self) -> Result<f64> {
        let header = self.read_leaf_header()?;
        match header.length {
            4 => {
                let mut buf = [0u8; 4];
                self.read_payload_into(&mut buf)?;
                Ok(f64::from(f32::from_be_bytes(buf)))
            }
            8 => {
                let mut buf = [0u8; 8];
                self.read_payload_into(&mut buf)?;
                Ok(f64::from_be_bytes(buf))
            }
            10 => {
                self.skip_payload(&header)?;
                Err(DemuxError::Unimplemented("80-bit extended precision floats"))
            }
            _ => {
                self.skip_payload(&header)?;
                Err(Self::invalid_size(&header))
            }
        }
    }

    /// ASCII and UTF-8 strings; trailing zero padding is dropped. Payloads
    /// that are not valid UTF-8 map each byte to one char, so no byte is lost.
    pub fn read_string(&mut self) -> Result<String> {
        let mut data = self.read_binary()?;
        while data.last() == Some(&0) {
            data.pop();
        }
        Ok(match String::from_utf8(data) {
            Ok(s) => s,
            Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
        })
    }

    pub fn read_binary(&mut self) -> Result<Vec<u8>> {
        let header = self.read_leaf_header()?;
        self.read_payload(header.length)
    }

    /// Like [`read_binary`](Self::read_binary), also returning the element offset.
    pub fn read_binary_at(&mut self) -> Result<(Vec<u8>, u64)> {
        let header = self.read_leaf_header()?;
        self.read_payload(header.length).map(|data| (data, header.pos))
    }

    fn open_master(&mut self, allow_unknown: bool) -> Result<Master> {
        if self.levels.len() >= EBML_MAX_DEPTH {
            return Err(DemuxError::DepthExceeded(EBML_MAX_DEPTH));
        }

        let header = self.read_header()?;
        if header.length == UNKNOWN_LENGTH && !allow_unknown {
            return Err(Self::invalid_size(&header));
        }

        self.levels.push(Level {
            start: header.data_start,
            length: header.length,
        });

        Ok(Master {
            id: header.id,
            pos: header.pos,
            depth: self.levels.len(),
        })
    }

    /// Opens a master element with a known length.
    pub fn read_master(&mut self) -> Result<Master> {
        self.open_master(false)
    }

    /// Opens a master element that may extend to the end of the stream.
    pub fn read_master_unsized(&mut self) -> Result<Master> {
        self.open_master(true)
    }

    /// Pushes a level frame that is not backed by an element header.
    pub fn push_level(&mut self, level: Level) -> Result<usize> {
        if self.levels.len() >= EBML_MAX_DEPTH {
            return Err(DemuxError::DepthExceeded(EBML_MAX_DEPTH));
        }
        self.levels.push(level);
        Ok(self.levels.len())
    }

    /// Drops levels above `depth`.
    pub fn truncate_levels(&mut self, depth: usize) {
        self.levels.truncate(depth);
    }

    /// Skips the next element, master or leaf, without decoding it.
    pub fn skip(&mut self) -> Result<()> {
        let header = self.read_leaf_header()?;
        trace!(
            "Skipping element {:#X} ({} bytes) at {}",
            header.id, header.length, header.pos
        );
        self.skip_payload(&header)
    }

    /// Moves to an absolute offset, dropping any peeked ID.
    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.check_lost()?;
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        self.peeked = None;
        Ok(())
    }

    /// Snapshots the cursor; it is restored when the guard goes out of scope.
    pub fn guard(&mut self) -> PositionGuard<'_, R> {
        PositionGuard {
            pos: self.pos,
            peeked: self.peeked,
            levels: self.levels.clone(),
            reader: self,
        }
    }
}

/// Restores position, lookahead and level stack of an [`EbmlReader`] on drop.
pub struct PositionGuard<'a, R: Read + Seek> {
    reader: &'a mut EbmlReader<R>,
    pos: u64,
    peeked: Option<PeekedId>,
    levels: Vec<Level>,
}

impl<R: Read + Seek> Deref for PositionGuard<'_, R> {
    type Target = EbmlReader<R>;

    fn deref(&self) -> &Self::Target {
        self.reader
    }
}

impl<R: Read + Seek> DerefMut for PositionGuard<'_, R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.reader
    }
}

impl<R: Read + Seek> Drop for PositionGuard<'_, R> {
    fn drop(&mut self) {
        self.reader.levels = std::mem::take(&mut self.levels);
        self.reader.peeked = self.peeked;
        match self.reader.inner.seek(SeekFrom::Start(self.pos)) {
            Ok(_) => self.reader.pos = self.pos,
            Err(e) => {
                error!("Failed to restore stream position {}: {e}", self.pos);
                self.reader.lost = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::*;
    use std::io::Cursor;

    fn reader(data: Vec<u8>) -> EbmlReader<Cursor<Vec<u8>>> {
        EbmlReader::new(Cursor::new(data)).unwrap()
    }

    #[test]
    fn level_closes_after_payload() -> anyhow::Result<()> {
        let data = [
            master(0x1A45DFA3, &[uint(0x4286, 1), uint(0x42F7, 1)]),
            uint(0xEC, 7),
        ]
        .concat();
        let mut r = reader(data);

        assert_eq!(r.peek_id()?, (0x1A45DFA3, 0));
        let header = r.read_master()?;
        assert_eq!(header.depth, 1);

        assert_eq!(r.peek_id()?, (0x4286, 0));
        assert_eq!(r.read_uint()?, 1);
        assert_eq!(r.peek_id()?, (0x42F7, 0));
        assert_eq!(r.read_uint()?, 1);
        for level in r.levels() {
            assert!(level.start <= r.position() && r.position() <= level.end());
        }

        // the sibling after the master reports the closed level
        assert_eq!(r.peek_id()?, (0xEC, 1));
        assert_eq!(r.depth(), 0);
        // a second peek hits the cache
        assert_eq!(r.peek_id()?, (0xEC, 0));
        assert_eq!(r.read_uint()?, 7);
        assert!(matches!(r.peek_id(), Err(DemuxError::EndOfStream)));
        Ok(())
    }

    #[test]
    fn next_child_stops_at_level_end() -> anyhow::Result<()> {
        let data = [
            master(0x18538067, &[master(0x1549A966, &[uint(0x2AD7B1, 1_000_000)])]),
        ]
        .concat();
        let mut r = reader(data);

        let segment = r.read_master()?;
        assert_eq!(r.next_child(segment.depth)?, Some(0x1549A966));
        let info = r.read_master()?;
        assert_eq!(r.next_child(info.depth)?, Some(0x2AD7B1));
        assert_eq!(r.read_uint()?, 1_000_000);
        assert_eq!(r.next_child(info.depth)?, None);
        // both levels ended at the same byte
        assert_eq!(r.next_child(segment.depth)?, None);
        assert_eq!(r.depth(), 0);
        Ok(())
    }

    #[test]
    fn depth_bound() -> anyhow::Result<()> {
        let mut nested = uint(0xEC, 0);
        for _ in 0..17 {
            nested = master(0x80, &[nested]);
        }
        let mut r = reader(nested);

        for depth in 1..=EBML_MAX_DEPTH {
            assert_eq!(r.read_master()?.depth, depth);
        }
        assert!(matches!(
            r.read_master(),
            Err(DemuxError::DepthExceeded(EBML_MAX_DEPTH))
        ));
        assert_eq!(r.depth(), EBML_MAX_DEPTH);
        Ok(())
    }

    #[test]
    fn integer_sizes() -> anyhow::Result<()> {
        let data = [
            element(0x4286, &[0; 9]),
            element(0x4287, &[0xFF, 0xFE]),
            element(0x4285, &[0x01, 0x00]),
            element(0x42F7, &[]),
        ]
        .concat();
        let mut r = reader(data);

        assert!(matches!(
            r.read_uint(),
            Err(DemuxError::InvalidElementSize { id: 0x4286, size: 9, pos: 0 })
        ));
        // payload was skipped, the cursor stays usable
        assert_eq!(r.read_sint()?, -2);
        assert_eq!(r.read_sint()?, 256);
        assert!(matches!(r.read_uint(), Err(DemuxError::InvalidElementSize { .. })));
        Ok(())
    }

    #[test]
    fn float_sizes() -> anyhow::Result<()> {
        let data = [
            element(0x4489, &1.5f32.to_be_bytes()),
            element(0x4489, &48000.0f64.to_be_bytes()),
            element(0x4489, &[0x40; 10]),
            element(0x4489, &[0x40; 2]),
            float(0xB5, 0.25),
        ]
        .concat();
        let mut r = reader(data);

        assert_eq!(r.read_float()?, 1.5);
        assert_eq!(r.read_float()?, 48000.0);
        assert!(matches!(r.read_float(), Err(DemuxError::Unimplemented(_))));
        assert!(matches!(
            r.read_float(),
            Err(DemuxError::InvalidElementSize { size: 2, .. })
        ));
        assert_eq!(r.read_float()?, 0.25);
        Ok(())
    }

    #[test]
    fn strings_and_binary() -> anyhow::Result<()> {
        let data = [
            element(0x4282, b"matroska\0\0"),
            string(0x7BA9, "Titel \u{e4}"),
            element(0x63A2, &[0, 1, 2, 0]),
        ]
        .concat();
        let mut r = reader(data);

        assert_eq!(r.read_string()?, "matroska");
        assert_eq!(r.read_string()?, "Titel \u{e4}");
        assert_eq!(r.read_binary()?, vec![0, 1, 2, 0]);
        Ok(())
    }

    #[test]
    fn invalid_utf8_keeps_every_byte() -> anyhow::Result<()> {
        let mut r = reader(element(0x536E, &[b'A', 0xE9, 0xFF, 0]));

        let name = r.read_string()?;
        assert_eq!(name, "A\u{e9}\u{ff}");
        let bytes: Vec<u8> = name.chars().map(|c| c as u8).collect();
        assert_eq!(bytes, [b'A', 0xE9, 0xFF]);
        Ok(())
    }

    #[test]
    fn child_overflowing_parent() -> anyhow::Result<()> {
        // parent declares 3 bytes, child declares 4
        let data = [vec![0xA0, 0x83], vec![0xE7, 0x84, 1, 2, 3, 4]].concat();
        let mut r = reader(data);

        r.read_master()?;
        assert!(matches!(
            r.read_uint(),
            Err(DemuxError::ElementOverflow { id: 0xE7, pos: 2 })
        ));
        Ok(())
    }

    #[test]
    fn truncated_payload() -> anyhow::Result<()> {
        let mut r = reader(vec![0x63, 0xA2, 0x88, 1, 2, 3]);
        assert!(matches!(r.read_binary(), Err(DemuxError::TruncatedStream(6))));
        Ok(())
    }

    #[test]
    fn guard_restores_state() -> anyhow::Result<()> {
        let data = [
            master(0x18538067, &[uint(0xE7, 5), uint(0xEC, 0), uint(0xE7, 9)]),
        ]
        .concat();
        let mut r = reader(data);

        let segment = r.read_master()?;
        assert_eq!(r.next_child(segment.depth)?, Some(0xE7));
        let before = (r.position(), r.element_start(), r.levels().to_vec());

        {
            let mut guard = r.guard();
            let target = guard.levels()[0].start + 6;
            guard.seek_to(target)?;
            guard.push_level(Level {
                start: 0,
                length: UNKNOWN_LENGTH,
            })?;
            assert_eq!(guard.peek_id()?, (0xE7, 0));
            assert_eq!(guard.read_uint()?, 9);
        }

        assert_eq!((r.position(), r.element_start(), r.levels().to_vec()), before);
        assert_eq!(r.peek_id()?, (0xE7, 0));
        assert_eq!(r.read_uint()?, 5);
        Ok(())
    }
}
