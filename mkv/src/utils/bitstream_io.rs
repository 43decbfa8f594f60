//! Big-endian reader over in-memory element payloads.
//!
//! Block headers mix vints, a signed 16-bit timecode and single-bit flags,
//! and lace tables are byte runs that index back into the same payload.

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, SignedInteger, UnsignedInteger};

use crate::utils::errors::{DemuxError, Result};
use crate::utils::vint::decode_vint;

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_n({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn get_s<S: SignedInteger>(&mut self, n: u32) -> io::Result<S> {
        match self.bs.read_signed_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_s({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    /// Reads a byte-aligned vint of at most `max_width` bytes.
    pub fn get_vint(&mut self, max_width: usize) -> Result<(u64, usize)> {
        let pos = self.byte_position()?;
        let first = self.get_byte()?;
        decode_vint(first, max_width, pos, || self.get_byte())
    }

    fn get_byte(&mut self) -> Result<u8> {
        match self.get_n::<u8>(8) {
            Ok(byte) => Ok(byte),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(DemuxError::TruncatedStream(
                self.byte_position().unwrap_or(self.len >> 3),
            )),
            Err(e) => Err(e.into()),
        }
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    /// Whole bytes consumed so far.
    #[inline(always)]
    pub fn byte_position(&mut self) -> io::Result<u64> {
        self.position().map(|bits| bits >> 3)
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}
