//! Segment information: timing base, duration and muxer details.

use std::io::{Read, Seek};

use log::{debug, warn};

use crate::process::demux::DemuxState;
use crate::structs::ids;
use crate::utils::ebml_reader::EbmlReader;
use crate::utils::errors::{DemuxError, Result};

/// Nanoseconds per tick when `TimecodeScale` is absent.
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Seconds between the Unix epoch and the Matroska date epoch (2001-01-01).
pub const MATROSKA_EPOCH_UNIX_SECS: i64 = 978_307_200;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    /// Nanoseconds per tick.
    pub timecode_scale: u64,
    /// Duration in ticks.
    pub duration: Option<f64>,
    pub title: Option<String>,
    pub writing_app: Option<String>,
    pub muxing_app: Option<String>,
    /// Nanoseconds since 2001-01-01T00:00:00 UTC.
    pub date_utc: Option<i64>,
    pub segment_uid: Option<Vec<u8>>,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            timecode_scale: DEFAULT_TIMECODE_SCALE,
            duration: None,
            title: None,
            writing_app: None,
            muxing_app: None,
            date_utc: None,
            segment_uid: None,
        }
    }
}

impl SegmentInfo {
    pub fn read<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Self> {
        let master = reader.read_master()?;
        let mut info = Self::default();

        while let Some(id) = reader.next_child(master.depth)? {
            match id {
                ids::TIMECODE_SCALE => {
                    if let Some(scale) = state.field(reader.read_uint())? {
                        if scale == 0 {
                            warn!("TimecodeScale of 0, using {DEFAULT_TIMECODE_SCALE}");
                        } else {
                            info.timecode_scale = scale;
                        }
                    }
                }
                ids::DURATION => info.duration = state.field(reader.read_float())?,
                ids::TITLE => info.title = state.field(reader.read_string())?,
                ids::WRITING_APP => info.writing_app = state.field(reader.read_string())?,
                ids::MUXING_APP => info.muxing_app = state.field(reader.read_string())?,
                ids::DATE_UTC => info.date_utc = state.field(reader.read_date())?,
                ids::SEGMENT_UID => info.segment_uid = state.field(reader.read_binary())?,
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

        Ok(info)
    }

    /// Duration in nanoseconds.
    pub fn duration_ns(&self) -> Option<f64> {
        self.duration.map(|ticks| ticks * self.timecode_scale as f64)
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_ns().map(|ns| ns / 1e9)
    }

    /// `DateUTC` as whole seconds since the Unix epoch.
    pub fn date_unix_secs(&self) -> Option<i64> {
        self.date_utc
            .map(|ns| MATROSKA_EPOCH_UNIX_SECS + ns.div_euclid(1_000_000_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::*;
    use std::io::Cursor;

    fn parse(data: Vec<u8>) -> Result<SegmentInfo> {
        let state = DemuxState::default();
        SegmentInfo::read(&state, &mut EbmlReader::new(Cursor::new(data))?)
    }

    #[test]
    fn fields_and_defaults() -> anyhow::Result<()> {
        let info = parse(master(
            ids::INFO,
            &[
                float(ids::DURATION, 2500.0),
                string(ids::TITLE, "Big Buck Bunny"),
                string(ids::WRITING_APP, "mkvmerge"),
                element(ids::DATE_UTC, &1_000_000_000i64.to_be_bytes()),
            ],
        ))?;

        assert_eq!(info.timecode_scale, DEFAULT_TIMECODE_SCALE);
        assert_eq!(info.duration_secs(), Some(2.5));
        assert_eq!(info.title.as_deref(), Some("Big Buck Bunny"));
        assert_eq!(info.writing_app.as_deref(), Some("mkvmerge"));
        assert_eq!(info.muxing_app, None);
        assert_eq!(info.date_unix_secs(), Some(MATROSKA_EPOCH_UNIX_SECS + 1));
        Ok(())
    }

    #[test]
    fn malformed_fields_are_skipped() -> anyhow::Result<()> {
        let info = parse(master(
            ids::INFO,
            &[
                uint(ids::TIMECODE_SCALE, 0),
                element(ids::DURATION, &[0; 3]),
                uint(ids::TIMECODE_SCALE, 100_000),
            ],
        ))?;

        assert_eq!(info.timecode_scale, 100_000);
        assert_eq!(info.duration, None);
        Ok(())
    }
}
