//! SeekHead: offsets of other level-1 elements.

use std::io::{Read, Seek};

use log::debug;

use crate::process::demux::DemuxState;
use crate::structs::ids;
use crate::utils::ebml_reader::EbmlReader;
use crate::utils::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekEntry {
    /// Target element ID, marker bits included.
    pub id: u32,
    /// Offset relative to the Segment payload.
    pub position: u64,
}

impl SeekEntry {
    /// Whether the target is parsed out of order when reading the header.
    pub fn is_side_parsed(&self) -> bool {
        matches!(self.id, ids::CUES | ids::TAGS)
    }
}

pub fn read_seek_head<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Vec<SeekEntry>> {
    let master = reader.read_master()?;
    let mut entries = Vec::new();

    while let Some(id) = reader.next_child(master.depth)? {
        if id != ids::SEEK {
            reader.skip()?;
            continue;
        }

        let seek = reader.read_master()?;
        let mut target = None;
        let mut position = None;
        while let Some(id) = reader.next_child(seek.depth)? {
            match id {
                ids::SEEK_ID => target = state.field(reader.read_uint())?,
                ids::SEEK_POSITION => position = state.field(reader.read_uint())?,
                _ => reader.skip()?,
            }
        }

        match (target.and_then(|t| u32::try_from(t).ok()), position) {
            (Some(id), Some(position)) => entries.push(SeekEntry { id, position }),
            _ => debug!("Dropping incomplete Seek entry at byte {}", seek.pos),
        }
    }

    Ok(entries)
}
