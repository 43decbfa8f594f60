//! Cue points and the seek index built from them.

use std::io::{Read, Seek};

use log::{debug, warn};

use crate::process::demux::DemuxState;
use crate::structs::ids;
use crate::utils::ebml_reader::EbmlReader;
use crate::utils::errors::{DemuxError, Result};

/// Index tables whose second entry lies beyond this many nanoseconds are
/// treated as broken.
pub const MAX_SANE_INDEX_TIME_NS: u64 = 100_000_000_000_000;

/// One `(time, track, cluster position)` triple of a `CuePoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuePoint {
    /// Ticks.
    pub time: u64,
    pub track: u64,
    /// Offset of the Cluster relative to the Segment payload.
    pub cluster_position: u64,
}

/// Reads a `Cues` element. Cue points missing any of their three fields are
/// dropped.
pub fn read_cues<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Vec<CuePoint>> {
    let master = reader.read_master()?;
    let mut cues = Vec::new();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::CUE_POINT => read_cue_point(state, reader, &mut cues)?,
            _ => reader.skip()?,
        }
    }

    debug!("Read {} cue points", cues.len());
    Ok(cues)
}

fn read_cue_point<R: Read + Seek>(
    state: &DemuxState,
    reader: &mut EbmlReader<R>,
    cues: &mut Vec<CuePoint>,
) -> Result<()> {
    let master = reader.read_master()?;
    let malformed =
        |e: DemuxError| DemuxError::MalformedCueEntry(format!("CuePoint at byte {}: {e}", master.pos));

    let mut time = None;
    let mut positions = Vec::new();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::CUE_TIME => time = state.recover(reader.read_uint(), malformed)?,
            ids::CUE_TRACK_POSITIONS => {
                let inner = reader.read_master()?;
                let mut track = None;
                let mut cluster_position = None;
                while let Some(id) = reader.next_child(inner.depth)? {
                    match id {
                        ids::CUE_TRACK => track = state.recover(reader.read_uint(), malformed)?,
                        ids::CUE_CLUSTER_POSITION => {
                            cluster_position = state.recover(reader.read_uint(), malformed)?
                        }
                        _ => reader.skip()?,
                    }
                }
                positions.push((track, cluster_position));
            }
            _ => reader.skip()?,
        }
    }

    for (track, cluster_position) in positions {
        match (time, track, cluster_position) {
            (Some(time), Some(track), Some(cluster_position)) => cues.push(CuePoint {
                time,
                track,
                cluster_position,
            }),
            _ => debug!("Dropping incomplete CuePoint at byte {}", master.pos),
        }
    }

    Ok(())
}

/// Position of a Cluster known to start at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Absolute byte offset of the Cluster.
    pub pos: u64,
    pub track: u64,
    /// Nanoseconds.
    pub time: u64,
}

/// Seek table, ordered by time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Inserts `entry` in time order. Returns `false` if the track already has
    /// an entry at that time.
    pub fn insert(&mut self, entry: IndexEntry) -> bool {
        let at = self.entries.partition_point(|e| e.time <= entry.time);
        let duplicate = self.entries[..at]
            .iter()
            .rev()
            .take_while(|e| e.time == entry.time)
            .any(|e| e.track == entry.track);
        if duplicate {
            return false;
        }
        self.entries.insert(at, entry);
        true
    }

    /// Builds the table from cue points, converting ticks with `time_scale`.
    pub fn from_cues(cues: &[CuePoint], segment_start: u64, time_scale: u64) -> Self {
        let mut index = Self::default();
        for cue in cues {
            index.insert(IndexEntry {
                pos: segment_start.saturating_add(cue.cluster_position),
                track: cue.track,
                time: cue.time.saturating_mul(time_scale),
            });
        }
        index
    }

    /// Drops the table when it looks broken, judged by its second entry as
    /// written in the file.
    pub fn sanity_check(&mut self, cues: &[CuePoint], time_scale: u64) -> bool {
        if let Some(second) = cues.get(1) {
            if second.time.saturating_mul(time_scale) > MAX_SANE_INDEX_TIME_NS {
                warn!("Dropping apparently-broken index");
                self.clear();
                return false;
            }
        }
        true
    }

    /// Last entry of `track` at or before `time`, or its first entry when
    /// `time` precedes all of them.
    pub fn search(&self, track: u64, time: u64) -> Option<&IndexEntry> {
        let at = self.entries.partition_point(|e| e.time <= time);
        self.entries[..at]
            .iter()
            .rev()
            .find(|e| e.track == track)
            .or_else(|| self.entries[at..].iter().find(|e| e.track == track))
    }

    /// Last entry of `track`, if any.
    pub fn last_for(&self, track: u64) -> Option<&IndexEntry> {
        self.entries.iter().rev().find(|e| e.track == track)
    }
}
