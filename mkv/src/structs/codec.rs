//! Mapping of Matroska codec identifiers to codecs.
//!
//! Codec IDs are matched by prefix, so profile suffixes such as
//! `A_AAC/MPEG4/LC` resolve to their base codec. PCM codec IDs are refined
//! with the track bit depth, and VfW/ACM compatibility IDs look inside the
//! codec private data.

use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    H264,
    Hevc,
    Av1,
    Vp8,
    Vp9,
    Mpeg1Video,
    Mpeg2Video,
    Mpeg4,
    Theora,
    ProRes,
    RawVideo,
    /// Video Compression Manager stream with an unmapped FourCC.
    VfwFourcc(u32),
    Aac,
    Ac3,
    Eac3,
    Dts,
    TrueHd,
    Mlp,
    Flac,
    Opus,
    Vorbis,
    Mp1,
    Mp2,
    Mp3,
    Alac,
    WavPack,
    Tta,
    PcmU8,
    PcmS16Le,
    PcmS16Be,
    PcmS24Le,
    PcmS24Be,
    PcmS32Le,
    PcmS32Be,
    PcmF32Le,
    PcmF64Le,
    /// Audio Compression Manager stream with an unmapped format tag.
    AcmFormat(u16),
    SubRip,
    Ass,
    WebVtt,
    DvdSubtitle,
    HdmvPgs,
    Unknown,
}

const CODEC_TAGS: &[(&str, Codec)] = &[
    ("V_MPEG4/ISO/AVC", Codec::H264),
    ("V_MPEGH/ISO/HEVC", Codec::Hevc),
    ("V_AV1", Codec::Av1),
    ("V_VP8", Codec::Vp8),
    ("V_VP9", Codec::Vp9),
    ("V_MPEG1", Codec::Mpeg1Video),
    ("V_MPEG2", Codec::Mpeg2Video),
    ("V_MPEG4/", Codec::Mpeg4),
    ("V_THEORA", Codec::Theora),
    ("V_PRORES", Codec::ProRes),
    ("V_UNCOMPRESSED", Codec::RawVideo),
    ("A_AAC", Codec::Aac),
    ("A_AC3", Codec::Ac3),
    ("A_EAC3", Codec::Eac3),
    ("A_DTS", Codec::Dts),
    ("A_TRUEHD", Codec::TrueHd),
    ("A_MLP", Codec::Mlp),
    ("A_FLAC", Codec::Flac),
    ("A_OPUS", Codec::Opus),
    ("A_VORBIS", Codec::Vorbis),
    ("A_MPEG/L1", Codec::Mp1),
    ("A_MPEG/L2", Codec::Mp2),
    ("A_MPEG/L3", Codec::Mp3),
    ("A_ALAC", Codec::Alac),
    ("A_WAVPACK4", Codec::WavPack),
    ("A_TTA1", Codec::Tta),
    ("A_PCM/INT/LIT", Codec::PcmS16Le),
    ("A_PCM/INT/BIG", Codec::PcmS16Be),
    ("A_PCM/FLOAT/IEEE", Codec::PcmF32Le),
    ("S_TEXT/UTF8", Codec::SubRip),
    ("S_TEXT/ASS", Codec::Ass),
    ("S_TEXT/SSA", Codec::Ass),
    ("S_ASS", Codec::Ass),
    ("S_SSA", Codec::Ass),
    ("S_TEXT/WEBVTT", Codec::WebVtt),
    ("S_VOBSUB", Codec::DvdSubtitle),
    ("S_HDMV/PGS", Codec::HdmvPgs),
];

const VFW_CODEC_ID: &str = "V_MS/VFW/FOURCC";
const ACM_CODEC_ID: &str = "A_MS/ACM";

/// Size of a BITMAPINFOHEADER; the FourCC sits at offset 16.
const BITMAPINFOHEADER_SIZE: usize = 40;

/// Size of a WAVEFORMATEX without extension; the format tag is first.
const WAVEFORMATEX_SIZE: usize = 18;

impl Codec {
    /// Looks up a codec ID without any track context.
    pub fn from_codec_id(codec_id: &str) -> Self {
        CODEC_TAGS
            .iter()
            .find(|(prefix, _)| codec_id.starts_with(prefix))
            .map_or(Self::Unknown, |&(_, codec)| codec)
    }

    /// Resolves a track's codec, refining PCM by bit depth and compatibility
    /// IDs by their private headers.
    pub fn for_track(codec_id: &str, bit_depth: Option<u64>, private: Option<&[u8]>) -> Self {
        if codec_id == VFW_CODEC_ID {
            return match private {
                Some(p) if p.len() >= BITMAPINFOHEADER_SIZE => {
                    Self::from_fourcc(u32::from_le_bytes([p[16], p[17], p[18], p[19]]))
                }
                _ => Self::Unknown,
            };
        }
        if codec_id == ACM_CODEC_ID {
            return match private {
                Some(p) if p.len() >= WAVEFORMATEX_SIZE => {
                    Self::from_format_tag(u16::from_le_bytes([p[0], p[1]]), bit_depth)
                }
                _ => Self::Unknown,
            };
        }

        match (Self::from_codec_id(codec_id), bit_depth) {
            (Self::PcmS16Le, Some(8)) | (Self::PcmS16Be, Some(8)) => Self::PcmU8,
            (Self::PcmS16Le, Some(24)) => Self::PcmS24Le,
            (Self::PcmS16Le, Some(32)) => Self::PcmS32Le,
            (Self::PcmS16Be, Some(24)) => Self::PcmS24Be,
            (Self::PcmS16Be, Some(32)) => Self::PcmS32Be,
            (Self::PcmF32Le, Some(64)) => Self::PcmF64Le,
            (codec, _) => codec,
        }
    }

    pub fn from_fourcc(fourcc: u32) -> Self {
        match &fourcc.to_le_bytes() {
            b"H264" | b"h264" | b"avc1" | b"X264" | b"x264" => Self::H264,
            b"XVID" | b"xvid" | b"DIVX" | b"divx" | b"DX50" | b"FMP4" | b"MP4V" => Self::Mpeg4,
            b"MPG1" => Self::Mpeg1Video,
            b"MPG2" | b"mpg2" => Self::Mpeg2Video,
            b"VP80" => Self::Vp8,
            b"VP90" => Self::Vp9,
            _ => Self::VfwFourcc(fourcc),
        }
    }

    pub fn from_format_tag(tag: u16, bit_depth: Option<u64>) -> Self {
        match tag {
            0x0001 => match bit_depth {
                Some(8) => Self::PcmU8,
                Some(24) => Self::PcmS24Le,
                Some(32) => Self::PcmS32Le,
                _ => Self::PcmS16Le,
            },
            0x0003 => Self::PcmF32Le,
            0x0050 => Self::Mp2,
            0x0055 => Self::Mp3,
            0x00FF | 0x1610 => Self::Aac,
            0x2000 => Self::Ac3,
            0x2001 => Self::Dts,
            0xF1AC => Self::Flac,
            _ => Self::AcmFormat(tag),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Av1 => "av1",
            Self::Vp8 => "vp8",
            Self::Vp9 => "vp9",
            Self::Mpeg1Video => "mpeg1video",
            Self::Mpeg2Video => "mpeg2video",
            Self::Mpeg4 => "mpeg4",
            Self::Theora => "theora",
            Self::ProRes => "prores",
            Self::RawVideo => "rawvideo",
            Self::VfwFourcc(_) => "vfw",
            Self::Aac => "aac",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Dts => "dts",
            Self::TrueHd => "truehd",
            Self::Mlp => "mlp",
            Self::Flac => "flac",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Mp1 => "mp1",
            Self::Mp2 => "mp2",
            Self::Mp3 => "mp3",
            Self::Alac => "alac",
            Self::WavPack => "wavpack",
            Self::Tta => "tta",
            Self::PcmU8 => "pcm_u8",
            Self::PcmS16Le => "pcm_s16le",
            Self::PcmS16Be => "pcm_s16be",
            Self::PcmS24Le => "pcm_s24le",
            Self::PcmS24Be => "pcm_s24be",
            Self::PcmS32Le => "pcm_s32le",
            Self::PcmS32Be => "pcm_s32be",
            Self::PcmF32Le => "pcm_f32le",
            Self::PcmF64Le => "pcm_f64le",
            Self::AcmFormat(_) => "acm",
            Self::SubRip => "subrip",
            Self::Ass => "ass",
            Self::WebVtt => "webvtt",
            Self::DvdSubtitle => "dvd_subtitle",
            Self::HdmvPgs => "hdmv_pgs_subtitle",
            Self::Unknown => "unknown",
        }
    }

    /// File extension for a raw dump of the elementary stream.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Av1 => "obu",
            Self::Mpeg1Video | Self::Mpeg2Video => "m2v",
            Self::Mpeg4 => "m4v",
            Self::Aac => "aac",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Dts => "dts",
            Self::TrueHd => "thd",
            Self::Mlp => "mlp",
            Self::Flac => "flac",
            Self::Mp1 => "mp1",
            Self::Mp2 => "mp2",
            Self::Mp3 => "mp3",
            Self::PcmU8
            | Self::PcmS16Le
            | Self::PcmS16Be
            | Self::PcmS24Le
            | Self::PcmS24Be
            | Self::PcmS32Le
            | Self::PcmS32Be
            | Self::PcmF32Le
            | Self::PcmF64Le => "pcm",
            Self::SubRip => "srt",
            Self::Ass => "ass",
            Self::WebVtt => "vtt",
            Self::DvdSubtitle => "sub",
            Self::HdmvPgs => "sup",
            _ => "bin",
        }
    }
}

impl Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VfwFourcc(fourcc) => {
                let bytes = fourcc.to_le_bytes();
                write!(f, "vfw ({})", String::from_utf8_lossy(&bytes))
            }
            Self::AcmFormat(tag) => write!(f, "acm ({tag:#06X})"),
            codec => f.write_str(codec.name()),
        }
    }
}
