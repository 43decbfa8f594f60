//! Matroska and WebM demuxing.
//!
//! Reads the EBML element tree of a Matroska document and delivers the
//! frames stored in its Blocks as timestamped packets. Payloads are passed
//! through untouched; decoding them is left to the caller.
//!
//! ## Technical Overview
//!
//! ### Document Structure
//!
//! **EBML**: Every element is an ID and a length, both variable-length
//! integers, followed by its payload. Master elements hold further elements.
//! **Segment**: Holds the level-1 elements: SeekHead, Info, Tracks, Cues,
//! Tags, Chapters, Attachments and the Clusters carrying the media data.
//!
//! ### Lacing
//!
//! One Block may pack several frames ("laces") with Xiph, fixed-size or
//! EBML lace size tables. Each lace becomes a separate packet.
//!
//! ### Error Handling
//!
//! Errors that leave byte offsets untrustworthy (truncation, malformed sizes,
//! excessive nesting) stop parsing. Content errors such as a broken Block or a
//! bad track field are logged and skipped, unless the fail level is lowered to
//! `Warn`.
//!
//! ## Quick Start
//!
//! 1. Check the input with [`process::probe::probe`]
//! 2. Open it with [`process::demux::Demuxer::open`], which reads the header
//! 3. Pull packets with [`process::demux::Demuxer::read_packet`] or iterate
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! use mkv::process::demux::Demuxer;
//!
//! let file = BufReader::new(File::open("movie.mkv")?);
//! let mut demuxer = Demuxer::open(file)?;
//!
//! for track in demuxer.tracks() {
//!     println!("#{} {} {}", track.number, track.track_type(), track.codec);
//! }
//!
//! // Jump to 60 s on the first stream
//! demuxer.seek(0, 60_000)?;
//!
//! for packet in demuxer {
//!     let packet = packet?;
//!     println!("stream {} at {} ms: {} bytes", packet.stream_index, packet.timestamp_ms, packet.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Processing of Matroska documents.
///
/// 1. **Probing** ([`process::probe`]): Scores a buffer by its EBML header.
///
/// 2. **Demuxing** ([`process::demux`]): Parses the header elements, then
///    turns Clusters into packets, with seeking through the index.
pub mod process;

/// Data structures representing Matroska elements.
///
/// - **Header** ([`structs::header`]): EBML header and doc type checks
/// - **Segment Info** ([`structs::info`]): Timecode scale, duration, titles
/// - **Tracks** ([`structs::track`]): Track entries and their codecs ([`structs::codec`])
/// - **Index** ([`structs::cues`]): Cue points and the seek index
/// - **Blocks** ([`structs::block`]): Block headers and lacing
/// - **Metadata** ([`structs::tags`], [`structs::chapters`], [`structs::attachment`])
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Errors** ([`utils::errors`]): Error types and recovery policy
/// - **Element cursor** ([`utils::ebml_reader`]): Level tracking and typed reads
/// - **Variable-length integers** ([`utils::vint`]): EBML vint decoding
pub mod utils;
