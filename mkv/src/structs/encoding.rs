//! Content encodings.
//!
//! A track may store its frames (and its CodecPrivate) compressed. Header
//! stripping removes a byte prefix common to every frame; zlib deflates each
//! frame. Only a single encoding per track is supported.

use std::borrow::Cow;
use std::io::{Read, Seek};

use flate2::read::ZlibDecoder;
use log::debug;

use crate::process::demux::DemuxState;
use crate::structs::ids;
use crate::utils::ebml_reader::EbmlReader;
use crate::utils::errors::{DemuxError, Result};

pub const SCOPE_FRAMES: u64 = 1;
pub const SCOPE_CODEC_PRIVATE: u64 = 2;

pub const COMP_ZLIB: u64 = 0;
pub const COMP_BZLIB: u64 = 1;
pub const COMP_LZO: u64 = 2;
pub const COMP_HEADER_STRIP: u64 = 3;

/// Largest frame accepted before or after decoding.
const MAX_FRAME_SIZE: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEncoding {
    pub order: u64,
    /// `SCOPE_*` bits.
    pub scope: u64,
    /// 0 for compression, 1 for encryption.
    pub encoding_type: u64,
    pub comp_algo: u64,
    pub comp_settings: Option<Vec<u8>>,
    pub enc_algo: u64,
    pub enc_key_id: Option<Vec<u8>>,
}

impl Default for ContentEncoding {
    fn default() -> Self {
        Self {
            order: 0,
            scope: SCOPE_FRAMES,
            encoding_type: 0,
            comp_algo: COMP_ZLIB,
            comp_settings: None,
            enc_algo: 0,
            enc_key_id: None,
        }
    }
}

impl ContentEncoding {
    fn method(&self) -> FrameEncoding {
        if self.encoding_type != 0 {
            return FrameEncoding::Unsupported(format!("encryption (algorithm {})", self.enc_algo));
        }

        match self.comp_algo {
            COMP_HEADER_STRIP => {
                FrameEncoding::HeaderStrip(self.comp_settings.clone().unwrap_or_default())
            }
            COMP_ZLIB => FrameEncoding::Zlib,
            COMP_BZLIB => FrameEncoding::Unsupported("bzlib compression".into()),
            COMP_LZO => FrameEncoding::Unsupported("lzo compression".into()),
            algo => FrameEncoding::Unsupported(format!("compression algorithm {algo}")),
        }
    }
}

/// How stored bytes are turned back into the original data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FrameEncoding {
    #[default]
    Plain,
    /// Prefix prepended to every frame.
    HeaderStrip(Vec<u8>),
    Zlib,
    Unsupported(String),
}

impl FrameEncoding {
    /// Decoding for data covered by any of the `scope` bits.
    pub fn for_scope(encodings: &[ContentEncoding], scope: u64) -> Self {
        match encodings {
            [] => Self::Plain,
            [encoding] if encoding.scope & scope == 0 => Self::Plain,
            [encoding] => encoding.method(),
            _ => Self::Unsupported("multiple combined encodings".into()),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    pub fn decode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        if data.len() as u64 >= MAX_FRAME_SIZE {
            return Err(DemuxError::CorruptFrame(format!(
                "{} byte frame is too large to decode",
                data.len()
            )));
        }

        match self {
            Self::Plain => Ok(Cow::Borrowed(data)),
            Self::HeaderStrip(header) if header.is_empty() => Ok(Cow::Borrowed(data)),
            Self::HeaderStrip(header) => Ok(Cow::Owned([header.as_slice(), data].concat())),
            Self::Zlib => {
                let mut out = Vec::new();
                ZlibDecoder::new(data)
                    .take(MAX_FRAME_SIZE + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| DemuxError::CorruptFrame(format!("zlib: {e}")))?;
                if out.len() as u64 > MAX_FRAME_SIZE {
                    return Err(DemuxError::CorruptFrame(format!(
                        "zlib frame inflates past {MAX_FRAME_SIZE} bytes"
                    )));
                }
                Ok(Cow::Owned(out))
            }
            Self::Unsupported(reason) => Err(DemuxError::UnsupportedEncoding(reason.clone())),
        }
    }
}

pub fn read_content_encodings<R: Read + Seek>(
    state: &DemuxState,
    reader: &mut EbmlReader<R>,
) -> Result<Vec<ContentEncoding>> {
    let master = reader.read_master()?;
    let mut encodings = Vec::new();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::CONTENT_ENCODING => encodings.push(read_content_encoding(state, reader)?),
            _ => reader.skip()?,
        }
    }

    encodings.sort_by_key(|encoding| encoding.order);
    Ok(encodings)
}

fn read_content_encoding<R: Read + Seek>(
    state: &DemuxState,
    reader: &mut EbmlReader<R>,
) -> Result<ContentEncoding> {
    let master = reader.read_master()?;
    let mut encoding = ContentEncoding::default();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::CONTENT_ENCODING_ORDER => {
                encoding.order = state.field(reader.read_uint())?.unwrap_or_default()
            }
            ids::CONTENT_ENCODING_SCOPE => {
                encoding.scope = state.field(reader.read_uint())?.unwrap_or(SCOPE_FRAMES)
            }
            ids::CONTENT_ENCODING_TYPE => {
                encoding.encoding_type = state.field(reader.read_uint())?.unwrap_or_default()
            }
            ids::CONTENT_COMPRESSION => {
                let compression = reader.read_master()?;
                while let Some(id) = reader.next_child(compression.depth)? {
                    match id {
                        ids::CONTENT_COMP_ALGO => {
                            encoding.comp_algo = state.field(reader.read_uint())?.unwrap_or_default()
                        }
                        ids::CONTENT_COMP_SETTINGS => {
                            encoding.comp_settings = state.field(reader.read_binary())?
                        }
                        _ => reader.skip()?,
                    }
                }
            }
            ids::CONTENT_ENCRYPTION => {
                let encryption = reader.read_master()?;
                while let Some(id) = reader.next_child(encryption.depth)? {
                    match id {
                        ids::CONTENT_ENC_ALGO => {
                            encoding.enc_algo = state.field(reader.read_uint())?.unwrap_or_default()
                        }
                        ids::CONTENT_ENC_KEY_ID => encoding.enc_key_id = state.field(reader.read_binary())?,
                        _ => reader.skip()?,
                    }
                }
            }
            _ => reader.skip()?,
        }
    }

    debug!(
        "ContentEncoding at byte {}: type {}, scope {}, algorithm {}",
        master.pos, encoding.encoding_type, encoding.scope, encoding.comp_algo
    );

    Ok(encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::*;
    use std::io::{Cursor, Write};

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    fn header_strip(prefix: &[u8], scope: u64) -> Vec<u8> {
        master(
            ids::CONTENT_ENCODING,
            &[
                uint(ids::CONTENT_ENCODING_SCOPE, scope),
                master(
                    ids::CONTENT_COMPRESSION,
                    &[
                        uint(ids::CONTENT_COMP_ALGO, COMP_HEADER_STRIP),
                        element(ids::CONTENT_COMP_SETTINGS, prefix),
                    ],
                ),
            ],
        )
    }

    fn parse(entries: &[Vec<u8>]) -> Result<Vec<ContentEncoding>> {
        let data = master(ids::CONTENT_ENCODINGS, entries);
        read_content_encodings(&DemuxState::default(), &mut EbmlReader::new(Cursor::new(data))?)
    }

    #[test]
    fn header_stripping() -> anyhow::Result<()> {
        let encodings = parse(&[header_strip(&[0xAA, 0xBB], SCOPE_FRAMES)])?;
        assert_eq!(encodings.len(), 1);

        let frames = FrameEncoding::for_scope(&encodings, SCOPE_FRAMES);
        assert_eq!(frames, FrameEncoding::HeaderStrip(vec![0xAA, 0xBB]));
        assert_eq!(frames.decode(&[1, 2])?.as_ref(), [0xAA, 0xBB, 1, 2]);

        assert_eq!(
            FrameEncoding::for_scope(&encodings, SCOPE_CODEC_PRIVATE),
            FrameEncoding::Plain
        );
        Ok(())
    }

    #[test]
    fn zlib_frames() -> anyhow::Result<()> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"matroska frame")?;
        let compressed = encoder.finish()?;

        let encodings = parse(&[master(
            ids::CONTENT_ENCODING,
            &[master(ids::CONTENT_COMPRESSION, &[uint(ids::CONTENT_COMP_ALGO, COMP_ZLIB)])],
        )])?;
        let frames = FrameEncoding::for_scope(&encodings, SCOPE_FRAMES);

        assert_eq!(frames, FrameEncoding::Zlib);
        assert_eq!(frames.decode(&compressed)?.as_ref(), b"matroska frame");
        assert!(matches!(
            frames.decode(&[1, 2, 3]),
            Err(DemuxError::CorruptFrame(_))
        ));
        Ok(())
    }

    #[test]
    fn unsupported_encodings() -> anyhow::Result<()> {
        let lzo = master(
            ids::CONTENT_ENCODING,
            &[master(ids::CONTENT_COMPRESSION, &[uint(ids::CONTENT_COMP_ALGO, COMP_LZO)])],
        );
        let encrypted = master(
            ids::CONTENT_ENCODING,
            &[
                uint(ids::CONTENT_ENCODING_TYPE, 1),
                master(ids::CONTENT_ENCRYPTION, &[uint(ids::CONTENT_ENC_ALGO, 5)]),
            ],
        );

        let frames = FrameEncoding::for_scope(&parse(&[lzo.clone()])?, SCOPE_FRAMES);
        assert!(!frames.is_supported());
        assert!(matches!(
            frames.decode(&[0]),
            Err(DemuxError::UnsupportedEncoding(_))
        ));

        let encodings = parse(&[encrypted])?;
        assert_eq!(encodings[0].enc_algo, 5);
        assert!(!FrameEncoding::for_scope(&encodings, SCOPE_FRAMES).is_supported());

        let combined = parse(&[lzo, header_strip(&[1], SCOPE_FRAMES)])?;
        assert!(!FrameEncoding::for_scope(&combined, SCOPE_FRAMES).is_supported());
        Ok(())
    }
}
