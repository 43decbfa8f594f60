//! Utility functions and supporting infrastructure.
//!
//! Variable-length integer decoding, the element cursor, an in-memory
//! bitstream reader for block headers, and error handling.

pub mod bitstream_io;
pub mod ebml_reader;
pub mod errors;
pub mod vint;

#[cfg(test)]
pub(crate) mod testing;
