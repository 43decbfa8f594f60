//! Block and SimpleBlock headers and lace splitting.
//!
//! A Block body is the track number as a vint, a signed 16-bit timecode
//! relative to the Cluster, a flags byte and the frame data. With lacing the
//! frame data starts with a lace count and a table of lace sizes; the last
//! lace always takes whatever remains.

use std::fmt::{self, Display};
use std::ops::Range;

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::{DemuxError, Result};
use crate::utils::vint::{MAX_LENGTH_WIDTH, signed_from_vint};

pub const FLAG_KEYFRAME: u8 = 0x80;
pub const FLAG_INVISIBLE: u8 = 0x08;
pub const FLAG_DISCARDABLE: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lacing {
    None,
    Xiph,
    Fixed,
    Ebml,
}

impl From<u8> for Lacing {
    fn from(flags: u8) -> Self {
        match (flags >> 1) & 0x3 {
            0 => Self::None,
            1 => Self::Xiph,
            2 => Self::Fixed,
            _ => Self::Ebml,
        }
    }
}

impl Display for Lacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Xiph => "Xiph",
            Self::Fixed => "fixed-size",
            Self::Ebml => "EBML",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub track: u64,
    /// Ticks relative to the Cluster timecode.
    pub timecode: i16,
    pub flags: u8,
    pub lacing: Lacing,
    /// Offset of the frame data (or lace count) within the body.
    pub data_offset: usize,
}

fn malformed(msg: impl Into<String>) -> DemuxError {
    DemuxError::MalformedLace(msg.into())
}

impl BlockHeader {
    /// Parses the fixed part of a Block body. Returns `None` for bodies too
    /// short to carry anything after the track number.
    pub fn parse(data: &[u8]) -> Result<Option<Self>> {
        let mut bs = BsIoSliceReader::from_slice(data);
        let (track, width) = bs
            .get_vint(MAX_LENGTH_WIDTH)
            .map_err(|e| malformed(format!("bad track number: {e}")))?;

        if data.len() - width <= 3 {
            return Ok(None);
        }

        let timecode = bs
            .get_s::<i16>(16)
            .map_err(|e| malformed(format!("bad timecode: {e}")))?;
        let flags = bs
            .get_n::<u8>(8)
            .map_err(|e| malformed(format!("bad flags: {e}")))?;

        Ok(Some(Self {
            track,
            timecode,
            flags,
            lacing: Lacing::from(flags),
            data_offset: width + 3,
        }))
    }

    /// Only meaningful for SimpleBlocks.
    pub fn is_keyframe(&self) -> bool {
        self.flags & FLAG_KEYFRAME != 0
    }

    pub fn is_invisible(&self) -> bool {
        self.flags & FLAG_INVISIBLE != 0
    }

    pub fn is_discardable(&self) -> bool {
        self.flags & FLAG_DISCARDABLE != 0
    }

    /// Splits the frame data into laces, as byte ranges of `data`.
    pub fn split_laces(&self, data: &[u8]) -> Result<Vec<Range<usize>>> {
        let start = self.data_offset;
        if self.lacing == Lacing::None {
            return Ok(vec![start..data.len()]);
        }

        let mut bs = BsIoSliceReader::from_slice(&data[start..]);
        let laces = bs
            .get_n::<u8>(8)
            .map_err(|_| malformed("missing lace count"))? as usize
            + 1;

        let mut sizes = Vec::with_capacity(laces);
        match self.lacing {
            Lacing::Xiph => {
                for _ in 1..laces {
                    let mut size = 0u64;
                    loop {
                        let byte = bs
                            .get_n::<u8>(8)
                            .map_err(|_| malformed("Xiph lace size runs past the block"))?;
                        size += u64::from(byte);
                        if byte != 0xFF {
                            break;
                        }
                    }
                    sizes.push(size);
                }
            }
            Lacing::Ebml if laces > 1 => {
                let (first, _) = bs
                    .get_vint(MAX_LENGTH_WIDTH)
                    .map_err(|e| malformed(format!("bad first EBML lace size: {e}")))?;
                sizes.push(first);
                let mut previous = i64::try_from(first).map_err(|_| malformed("EBML lace size overflow"))?;
                for n in 2..laces {
                    let (value, width) = bs
                        .get_vint(MAX_LENGTH_WIDTH)
                        .map_err(|e| malformed(format!("bad EBML lace delta: {e}")))?;
                    let size = previous
                        .checked_add(signed_from_vint(value, width))
                        .filter(|size| *size >= 0)
                        .ok_or_else(|| malformed(format!("negative size for EBML lace {n}")))?;
                    sizes.push(size as u64);
                    previous = size;
                }
            }
            _ => {}
        }

        let table = bs
            .byte_position()
            .map_err(|e| malformed(format!("lace table: {e}")))? as usize;
        let first = start + table;
        let remaining = (data.len() - first) as u64;

        if self.lacing == Lacing::Fixed {
            if remaining % laces as u64 != 0 {
                return Err(malformed(format!(
                    "{remaining} bytes cannot be split into {laces} fixed-size laces"
                )));
            }
            sizes.resize(laces - 1, remaining / laces as u64);
        }

        let total = sizes
            .iter()
            .try_fold(0u64, |acc, &size| acc.checked_add(size))
            .filter(|&total| total <= remaining)
            .ok_or_else(|| {
                malformed(format!(
                    "{} lace sizes exceed the {remaining} remaining bytes",
                    self.lacing
                ))
            })?;
        sizes.push(remaining - total);

        let mut offset = first;
        Ok(sizes
            .into_iter()
            .map(|size| {
                let range = offset..offset + size as usize;
                offset = range.end;
                range
            })
            .collect())
    }
}
