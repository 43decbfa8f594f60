//! Data structures read from a Matroska document.
//!
//! Each level-1 element has its own module holding the parsed record types and
//! the reader that fills them from an [`EbmlReader`](crate::utils::ebml_reader::EbmlReader).

pub mod attachment;
pub mod block;
pub mod chapters;
pub mod codec;
pub mod cues;
pub mod encoding;
pub mod header;
pub mod ids;
pub mod info;
pub mod packet;
pub mod seekhead;
pub mod tags;
pub mod track;
