//! Track entries.
//!
//! A `TrackEntry` describes one elementary stream. Its type decides which
//! sub-block (`Video` or `Audio`) carries the stream parameters; the pair is
//! kept together as a [`TrackKind`] variant.

use std::fmt::{self, Display};
use std::io::{Read, Seek};

use log::Level::Warn;
use log::debug;

use crate::log_or_err;
use crate::process::demux::DemuxState;
use crate::structs::codec::Codec;
use crate::structs::encoding::{
    ContentEncoding, FrameEncoding, SCOPE_CODEC_PRIVATE, SCOPE_FRAMES, read_content_encodings,
};
use crate::structs::ids;
use crate::utils::ebml_reader::EbmlReader;
use crate::utils::errors::{DemuxError, Result};

pub const TRACK_FLAG_ENABLED: u32 = 1 << 0;
pub const TRACK_FLAG_DEFAULT: u32 = 1 << 1;
pub const TRACK_FLAG_LACING: u32 = 1 << 2;
pub const TRACK_FLAG_FORCED: u32 = 1 << 3;

const DEFAULT_FLAGS: u32 = TRACK_FLAG_ENABLED | TRACK_FLAG_DEFAULT | TRACK_FLAG_LACING;

pub const DEFAULT_LANGUAGE: &str = "eng";

/// Track timecode scales below this are treated as 1.0.
const MIN_TRACK_TIME_SCALE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Video,
    Audio,
    Complex,
    Logo,
    Subtitle,
    Control,
}

impl TryFrom<u64> for TrackType {
    type Error = DemuxError;

    fn try_from(value: u64) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Video),
            0x02 => Ok(Self::Audio),
            0x03 => Ok(Self::Complex),
            0x10 => Ok(Self::Logo),
            0x11 => Ok(Self::Subtitle),
            0x20 => Ok(Self::Control),
            _ => Err(DemuxError::MalformedTrackField(format!(
                "unknown TrackType {value:#X}"
            ))),
        }
    }
}

impl Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Complex => "complex",
            Self::Logo => "logo",
            Self::Subtitle => "subtitle",
            Self::Control => "control",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoTrack {
    pub pixel_width: u64,
    pub pixel_height: u64,
    pub display_width: Option<u64>,
    pub display_height: Option<u64>,
    pub interlaced: bool,
    pub stereo_mode: u64,
    pub aspect_ratio_mode: u64,
    pub fourcc: Option<u32>,
    pub frame_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub channels: u64,
    pub bit_depth: Option<u64>,
    /// Hz.
    pub sampling_frequency: f64,
    pub output_sampling_frequency: Option<f64>,
}

impl Default for AudioTrack {
    fn default() -> Self {
        Self {
            channels: 1,
            bit_depth: None,
            sampling_frequency: 8000.0,
            output_sampling_frequency: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackKind {
    Video(VideoTrack),
    Audio(AudioTrack),
    Complex,
    Logo,
    Subtitle,
    Control,
}

impl TrackKind {
    pub fn track_type(&self) -> TrackType {
        match self {
            Self::Video(_) => TrackType::Video,
            Self::Audio(_) => TrackType::Audio,
            Self::Complex => TrackType::Complex,
            Self::Logo => TrackType::Logo,
            Self::Subtitle => TrackType::Subtitle,
            Self::Control => TrackType::Control,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Number used by Blocks to refer to this track.
    pub number: u64,
    pub uid: u64,
    pub kind: TrackKind,
    pub codec_id: String,
    pub codec: Codec,
    pub codec_name: Option<String>,
    pub codec_private: Option<Vec<u8>>,
    pub name: Option<String>,
    pub language: String,
    /// Nanoseconds per frame.
    pub default_duration: Option<u64>,
    /// Multiplier applied to Block timecodes of this track.
    pub time_scale: f64,
    /// `TRACK_FLAG_*` bits.
    pub flags: u32,
    pub codec_delay: Option<u64>,
    pub seek_pre_roll: Option<u64>,
    pub encodings: Vec<ContentEncoding>,
    /// Decoding applied to every frame before delivery.
    pub frame_encoding: FrameEncoding,
    /// Position in the demuxer's track table.
    pub stream_index: usize,
}

impl Track {
    pub fn track_type(&self) -> TrackType {
        self.kind.track_type()
    }

    pub fn video(&self) -> Option<&VideoTrack> {
        match &self.kind {
            TrackKind::Video(video) => Some(video),
            _ => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioTrack> {
        match &self.kind {
            TrackKind::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.flags & TRACK_FLAG_ENABLED != 0
    }

    pub fn is_default(&self) -> bool {
        self.flags & TRACK_FLAG_DEFAULT != 0
    }

    pub fn is_forced(&self) -> bool {
        self.flags & TRACK_FLAG_FORCED != 0
    }

    pub fn lacing_allowed(&self) -> bool {
        self.flags & TRACK_FLAG_LACING != 0
    }

    /// Reads one `TrackEntry`. Returns `None` when the entry lacks a number,
    /// type or codec ID and has been discarded.
    pub fn read<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Option<Self>> {
        let master = reader.read_master()?;
        let malformed = |what: &str, e: DemuxError| {
            DemuxError::MalformedTrackField(format!("{what} at byte {}: {e}", master.pos))
        };

        let mut number = None;
        let mut track_type = None;
        let mut video = None;
        let mut audio = None;
        let mut track = Self {
            number: 0,
            uid: 0,
            kind: TrackKind::Complex,
            codec_id: String::new(),
            codec: Codec::Unknown,
            codec_name: None,
            codec_private: None,
            name: None,
            language: DEFAULT_LANGUAGE.to_string(),
            default_duration: None,
            time_scale: 1.0,
            flags: DEFAULT_FLAGS,
            codec_delay: None,
            seek_pre_roll: None,
            encodings: Vec::new(),
            frame_encoding: FrameEncoding::Plain,
            stream_index: 0,
        };
        let mut codec_id = None;

        while let Some(id) = reader.next_child(master.depth)? {
            match id {
                ids::TRACK_NUMBER => {
                    number = state.recover(reader.read_uint(), |e| malformed("TrackNumber", e))?
                }
                ids::TRACK_UID => {
                    let uid = state.recover(reader.read_uint(), |e| malformed("TrackUID", e))?;
                    track.uid = uid.unwrap_or_default();
                }
                ids::TRACK_TYPE => {
                    let value = state.recover(reader.read_uint(), |e| malformed("TrackType", e))?;
                    let Some(value) = value else { continue };
                    let parsed = state.recover(TrackType::try_from(value), |e| e)?;
                    match (track_type, parsed) {
                        (Some(existing), Some(new)) if existing != new => {
                            let err = malformed(
                                "TrackType",
                                DemuxError::MalformedTrackField(format!(
                                    "redeclared as {new} after {existing}"
                                )),
                            );
                            log_or_err!(state, Warn, err);
                        }
                        (None, parsed) => track_type = parsed,
                        _ => {}
                    }
                }
                ids::TRACK_VIDEO => {
                    if track_type.is_some_and(|t| t != TrackType::Video) {
                        let err = malformed(
                            "Video",
                            DemuxError::MalformedTrackField("video settings in a non-video track".into()),
                        );
                        log_or_err!(state, Warn, err);
                        reader.skip()?;
                    } else {
                        video = Some(VideoTrack::read(state, reader)?);
                    }
                }
                ids::TRACK_AUDIO => {
                    if track_type.is_some_and(|t| t != TrackType::Audio) {
                        let err = malformed(
                            "Audio",
                            DemuxError::MalformedTrackField("audio settings in a non-audio track".into()),
                        );
                        log_or_err!(state, Warn, err);
                        reader.skip()?;
                    } else {
                        audio = Some(AudioTrack::read(state, reader)?);
                    }
                }
                ids::TRACK_FLAG_ENABLED => {
                    let flag = state.recover(reader.read_uint(), |e| malformed("FlagEnabled", e))?;
                    track.set_flag(TRACK_FLAG_ENABLED, flag);
                }
                ids::TRACK_FLAG_DEFAULT => {
                    let flag = state.recover(reader.read_uint(), |e| malformed("FlagDefault", e))?;
                    track.set_flag(TRACK_FLAG_DEFAULT, flag);
                }
                ids::TRACK_FLAG_FORCED => {
                    let flag = state.recover(reader.read_uint(), |e| malformed("FlagForced", e))?;
                    track.set_flag(TRACK_FLAG_FORCED, flag);
                }
                ids::TRACK_FLAG_LACING => {
                    let flag = state.recover(reader.read_uint(), |e| malformed("FlagLacing", e))?;
                    track.set_flag(TRACK_FLAG_LACING, flag);
                }
                ids::TRACK_DEFAULT_DURATION => {
                    track.default_duration =
                        state.recover(reader.read_uint(), |e| malformed("DefaultDuration", e))?
                }
                ids::TRACK_TIMECODE_SCALE => {
                    let scale = state.recover(reader.read_float(), |e| malformed("TrackTimecodeScale", e))?;
                    track.time_scale = scale.unwrap_or(track.time_scale);
                }
                ids::TRACK_NAME => {
                    track.name = state.recover(reader.read_string(), |e| malformed("Name", e))?
                }
                ids::TRACK_LANGUAGE => {
                    let language = state.recover(reader.read_string(), |e| malformed("Language", e))?;
                    if let Some(language) = language {
                        track.language = language;
                    }
                }
                ids::CODEC_ID => {
                    codec_id = state.recover(reader.read_string(), |e| malformed("CodecID", e))?
                }
                ids::CODEC_PRIVATE => {
                    track.codec_private =
                        state.recover(reader.read_binary(), |e| malformed("CodecPrivate", e))?
                }
                ids::CODEC_NAME => {
                    track.codec_name = state.recover(reader.read_string(), |e| malformed("CodecName", e))?
                }
                ids::CODEC_DELAY => {
                    track.codec_delay = state.recover(reader.read_uint(), |e| malformed("CodecDelay", e))?
                }
                ids::SEEK_PRE_ROLL => {
                    track.seek_pre_roll =
                        state.recover(reader.read_uint(), |e| malformed("SeekPreRoll", e))?
                }
                ids::CONTENT_ENCODINGS => track.encodings = read_content_encodings(state, reader)?,
                ids::VOID | ids::CRC32 => reader.skip()?,
                _ => {
                    debug!(
                        "{}",
                        DemuxError::UnknownElement {
                            id,
                            pos: reader.element_start()
                        }
                    );
                    reader.skip()?;
                }
            }
        }

        let missing = match (number, track_type, &codec_id) {
            (None | Some(0), _, _) => Some("TrackNumber"),
            (_, None, _) => Some("TrackType"),
            (_, _, None) => Some("CodecID"),
            _ => None,
        };
        if let Some(field) = missing {
            let err = DemuxError::MalformedTrackField(format!(
                "TrackEntry at byte {} without a valid {field}, discarded",
                master.pos
            ));
            log_or_err!(state, Warn, err);
            return Ok(None);
        }

        let (Some(number), Some(track_type), Some(codec_id)) = (number, track_type, codec_id) else {
            return Ok(None);
        };

        if (video.is_some() && track_type != TrackType::Video)
            || (audio.is_some() && track_type != TrackType::Audio)
        {
            let err = DemuxError::MalformedTrackField(format!(
                "track {number} declares type {track_type} but carries other settings"
            ));
            log_or_err!(state, Warn, err);
        }

        track.kind = match track_type {
            TrackType::Video => TrackKind::Video(video.unwrap_or_default()),
            TrackType::Audio => TrackKind::Audio(audio.unwrap_or_default()),
            TrackType::Complex => TrackKind::Complex,
            TrackType::Logo => TrackKind::Logo,
            TrackType::Subtitle => TrackKind::Subtitle,
            TrackType::Control => TrackKind::Control,
        };

        if track.time_scale.is_nan() || track.time_scale < MIN_TRACK_TIME_SCALE {
            debug!(
                "Track {number}: TrackTimecodeScale {} out of range, using 1.0",
                track.time_scale
            );
            track.time_scale = 1.0;
        }

        track.frame_encoding = FrameEncoding::for_scope(&track.encodings, SCOPE_FRAMES);
        let applied = FrameEncoding::for_scope(&track.encodings, SCOPE_FRAMES | SCOPE_CODEC_PRIVATE);
        if let FrameEncoding::Unsupported(reason) = applied {
            let err = DemuxError::UnsupportedEncoding(format!("track {number}: {reason}"));
            log_or_err!(state, Warn, err);
        }

        let private_encoding = FrameEncoding::for_scope(&track.encodings, SCOPE_CODEC_PRIVATE);
        if private_encoding.is_supported() {
            if let Some(private) = track.codec_private.take() {
                match private_encoding.decode(&private) {
                    Ok(decoded) => track.codec_private = Some(decoded.into_owned()),
                    Err(e) => {
                        let err = malformed("CodecPrivate", e);
                        log_or_err!(state, Warn, err);
                    }
                }
            }
        }

        let bit_depth = track.audio().and_then(|audio| audio.bit_depth);
        track.codec = Codec::for_track(&codec_id, bit_depth, track.codec_private.as_deref());
        if let TrackKind::Video(video) = &mut track.kind {
            if video.fourcc.is_none() {
                if let Codec::VfwFourcc(fourcc) = track.codec {
                    video.fourcc = Some(fourcc);
                }
            }
        }
        track.codec_id = codec_id;
        track.number = number;

        debug!(
            "Track {}: {} {} ({})",
            track.number, track.kind.track_type(), track.codec_id, track.codec
        );

        Ok(Some(track))
    }

    fn set_flag(&mut self, flag: u32, value: Option<u64>) {
        match value {
            Some(0) => self.flags &= !flag,
            Some(_) => self.flags |= flag,
            None => {}
        }
    }
}

impl VideoTrack {
    fn read<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Self> {
        let master = reader.read_master()?;
        let malformed = |what: &str, e: DemuxError| {
            DemuxError::MalformedTrackField(format!("Video {what} at byte {}: {e}", master.pos))
        };
        let mut video = Self::default();

        while let Some(id) = reader.next_child(master.depth)? {
            match id {
                ids::VIDEO_PIXEL_WIDTH => {
                    let value = state.recover(reader.read_uint(), |e| malformed("PixelWidth", e))?;
                    video.pixel_width = value.unwrap_or_default();
                }
                ids::VIDEO_PIXEL_HEIGHT => {
                    let value = state.recover(reader.read_uint(), |e| malformed("PixelHeight", e))?;
                    video.pixel_height = value.unwrap_or_default();
                }
                ids::VIDEO_DISPLAY_WIDTH => {
                    video.display_width =
                        state.recover(reader.read_uint(), |e| malformed("DisplayWidth", e))?
                }
                ids::VIDEO_DISPLAY_HEIGHT => {
                    video.display_height =
                        state.recover(reader.read_uint(), |e| malformed("DisplayHeight", e))?
                }
                ids::VIDEO_FLAG_INTERLACED => {
                    let value = state.recover(reader.read_uint(), |e| malformed("FlagInterlaced", e))?;
                    video.interlaced = value.is_some_and(|v| v == 1);
                }
                ids::VIDEO_STEREO_MODE => {
                    let value = state.recover(reader.read_uint(), |e| malformed("StereoMode", e))?;
                    video.stereo_mode = value.unwrap_or_default();
                }
                ids::VIDEO_ASPECT_RATIO_TYPE => {
                    let value = state.recover(reader.read_uint(), |e| malformed("AspectRatioType", e))?;
                    video.aspect_ratio_mode = value.unwrap_or_default();
                }
                ids::VIDEO_COLOUR_SPACE => {
                    let value = state.recover(reader.read_binary(), |e| malformed("ColourSpace", e))?;
                    video.fourcc = match value.as_deref() {
                        Some(&[a, b, c, d]) => Some(u32::from_le_bytes([a, b, c, d])),
                        _ => video.fourcc,
                    };
                }
                ids::VIDEO_FRAME_RATE => {
                    video.frame_rate = state.recover(reader.read_float(), |e| malformed("FrameRate", e))?
                }
                _ => reader.skip()?,
            }
        }

        Ok(video)
    }

    /// Display size, falling back to the pixel size.
    pub fn display_size(&self) -> (u64, u64) {
        (
            self.display_width.unwrap_or(self.pixel_width),
            self.display_height.unwrap_or(self.pixel_height),
        )
    }
}

impl AudioTrack {
    fn read<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Self> {
        let master = reader.read_master()?;
        let malformed = |what: &str, e: DemuxError| {
            DemuxError::MalformedTrackField(format!("Audio {what} at byte {}: {e}", master.pos))
        };
        let mut audio = Self::default();

        while let Some(id) = reader.next_child(master.depth)? {
            match id {
                ids::AUDIO_SAMPLING_FREQ => {
                    let value = state.recover(reader.read_float(), |e| malformed("SamplingFrequency", e))?;
                    audio.sampling_frequency = value.unwrap_or(audio.sampling_frequency);
                }
                ids::AUDIO_OUTPUT_SAMPLING_FREQ => {
                    audio.output_sampling_frequency = state.recover(reader.read_float(), |e| {
                        malformed("OutputSamplingFrequency", e)
                    })?
                }
                ids::AUDIO_CHANNELS => {
                    let value = state.recover(reader.read_uint(), |e| malformed("Channels", e))?;
                    audio.channels = value.unwrap_or(audio.channels);
                }
                ids::AUDIO_BIT_DEPTH => {
                    audio.bit_depth = state.recover(reader.read_uint(), |e| malformed("BitDepth", e))?
                }
                _ => reader.skip()?,
            }
        }

        Ok(audio)
    }

    /// Rate samples are presented at, accounting for SBR signalling.
    pub fn output_rate(&self) -> f64 {
        self.output_sampling_frequency.unwrap_or(self.sampling_frequency)
    }
}

/// Reads every `TrackEntry` of a `Tracks` element.
pub fn read_tracks<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Vec<Track>> {
    let master = reader.read_master()?;
    let mut tracks = Vec::new();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::TRACK_ENTRY => {
                if let Some(track) = Track::read(state, reader)? {
                    tracks.push(track);
                }
            }
            _ => reader.skip()?,
        }
    }

    Ok(tracks)
}
