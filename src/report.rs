//! Serializable view of a parsed container, shared by the plain and YAML
//! `info` output.

use std::io::{Read, Seek};

use serde::Serialize;

use mkv::process::demux::Demuxer;
use mkv::structs::chapters::{Chapter, Edition};
use mkv::structs::tags::{SimpleTag, Tag};
use mkv::structs::track::Track;

use crate::timestamp::{ms_str, time_str};

#[derive(Debug, Serialize)]
pub struct Report {
    pub doc_type: String,
    pub doc_type_version: u64,
    pub segment: SegmentReport,
    pub tracks: Vec<TrackReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub editions: Vec<EditionReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<Vec<IndexReport>>,
}

#[derive(Debug, Serialize)]
pub struct SegmentReport {
    pub start: u64,
    pub timecode_scale: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muxing_app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writing_app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_unix: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TrackReport {
    pub stream: usize,
    pub number: u64,
    pub uid: u64,
    #[serde(rename = "type")]
    pub track_type: String,
    pub codec_id: String,
    pub codec: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub default: bool,
    pub forced: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_duration_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec_private_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioReport>,
}

#[derive(Debug, Serialize)]
pub struct VideoReport {
    pub width: u64,
    pub height: u64,
    pub display_width: u64,
    pub display_height: u64,
    pub interlaced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AudioReport {
    pub channels: u64,
    pub sampling_frequency: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct EditionReport {
    pub uid: u64,
    pub default: bool,
    pub ordered: bool,
    pub chapters: Vec<ChapterReport>,
}

#[derive(Debug, Serialize)]
pub struct ChapterReport {
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChapterReport>,
}

#[derive(Debug, Serialize)]
pub struct TagReport {
    pub target_type_value: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub track_uids: Vec<u64>,
    pub values: Vec<TagValueReport>,
}

#[derive(Debug, Serialize)]
pub struct TagValueReport {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TagValueReport>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentReport {
    pub name: String,
    pub mime_type: String,
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct IndexReport {
    pub track: u64,
    pub time: String,
    pub pos: u64,
}

impl Report {
    pub fn new<R: Read + Seek>(demuxer: &Demuxer<R>, with_index: bool) -> Self {
        let info = demuxer.info();
        let header = demuxer.header();

        Self {
            doc_type: header.doc_type.clone(),
            doc_type_version: header.doc_type_version,
            segment: SegmentReport {
                start: demuxer.segment_start(),
                timecode_scale: info.timecode_scale,
                duration: info.duration_secs().map(time_str),
                title: info.title.clone(),
                muxing_app: info.muxing_app.clone(),
                writing_app: info.writing_app.clone(),
                date_unix: info.date_unix_secs(),
            },
            tracks: demuxer.tracks().iter().map(TrackReport::from).collect(),
            editions: demuxer.chapters().iter().map(EditionReport::from).collect(),
            tags: demuxer.tags().iter().map(TagReport::from).collect(),
            attachments: demuxer
                .attachments()
                .iter()
                .map(|attachment| AttachmentReport {
                    name: attachment.name.clone(),
                    mime_type: attachment.mime_type.clone(),
                    size: attachment.data.len(),
                })
                .collect(),
            index: with_index.then(|| {
                demuxer
                    .index()
                    .entries()
                    .iter()
                    .map(|entry| IndexReport {
                        track: entry.track,
                        time: ms_str(entry.time / 1_000_000),
                        pos: entry.pos,
                    })
                    .collect()
            }),
        }
    }
}

impl From<&Track> for TrackReport {
    fn from(track: &Track) -> Self {
        Self {
            stream: track.stream_index,
            number: track.number,
            uid: track.uid,
            track_type: track.track_type().to_string(),
            codec_id: track.codec_id.clone(),
            codec: track.codec.to_string(),
            language: track.language.clone(),
            name: track.name.clone(),
            default: track.is_default(),
            forced: track.is_forced(),
            enabled: track.is_enabled(),
            default_duration_ns: track.default_duration,
            codec_private_size: track.codec_private.as_ref().map(Vec::len),
            video: track.video().map(|video| {
                let (display_width, display_height) = video.display_size();
                VideoReport {
                    width: video.pixel_width,
                    height: video.pixel_height,
                    display_width,
                    display_height,
                    interlaced: video.interlaced,
                    frame_rate: video.frame_rate,
                }
            }),
            audio: track.audio().map(|audio| AudioReport {
                channels: audio.channels,
                sampling_frequency: audio.output_rate(),
                bit_depth: audio.bit_depth,
            }),
        }
    }
}

impl From<&Edition> for EditionReport {
    fn from(edition: &Edition) -> Self {
        Self {
            uid: edition.uid,
            default: edition.default,
            ordered: edition.ordered,
            chapters: edition.chapters.iter().map(ChapterReport::from).collect(),
        }
    }
}

impl From<&Chapter> for ChapterReport {
    fn from(chapter: &Chapter) -> Self {
        Self {
            start: ms_str(chapter.start / 1_000_000),
            end: chapter.end.map(|end| ms_str(end / 1_000_000)),
            title: chapter.title().map(str::to_string),
            children: chapter.children.iter().map(ChapterReport::from).collect(),
        }
    }
}

impl From<&Tag> for TagReport {
    fn from(tag: &Tag) -> Self {
        Self {
            target_type_value: tag.targets.type_value,
            track_uids: tag.targets.track_uids.clone(),
            values: tag.simple_tags.iter().map(TagValueReport::from).collect(),
        }
    }
}

impl From<&SimpleTag> for TagValueReport {
    fn from(tag: &SimpleTag) -> Self {
        let value = match (&tag.string, &tag.binary) {
            (Some(string), _) => string.clone(),
            (None, Some(binary)) => format!("<{} bytes>", binary.len()),
            (None, None) => String::new(),
        };

        Self {
            name: tag.name.clone(),
            value,
            children: tag.children.iter().map(TagValueReport::from).collect(),
        }
    }
}
