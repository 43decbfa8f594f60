//! Cluster parsing: Blocks and SimpleBlocks into queued packets.
//!
//! A BlockGroup's Block is queued as soon as it is read. `BlockReference`
//! and `BlockDuration` may follow it in the group, so both patch the packets
//! that are already in the queue.

use std::collections::VecDeque;
use std::io::{Read, Seek};

use log::{debug, trace};

use crate::process::demux::DemuxState;
use crate::structs::block::BlockHeader;
use crate::structs::ids;
use crate::structs::packet::Packet;
use crate::structs::track::TrackType;
use crate::utils::ebml_reader::EbmlReader;
use crate::utils::errors::{DemuxError, Result};

const NS_PER_MS: u64 = 1_000_000;

/// Where a Block came from and what its container already decided.
#[derive(Debug, Clone, Copy)]
struct BlockSource {
    pos: u64,
    cluster_pos: u64,
    /// Ticks.
    cluster_time: u64,
    /// Set for Blocks in a BlockGroup; SimpleBlocks carry their own flag.
    keyframe: Option<bool>,
    /// `BlockDuration` in ticks.
    duration: Option<u64>,
}

/// Packets queued for one Block.
#[derive(Debug, Clone, Copy)]
struct Assembled {
    first: usize,
    count: usize,
    start_ns: u64,
    track_scale: f64,
}

/// Reads the Cluster at the cursor, appending its packets to `queue`.
pub(crate) fn read_cluster<R: Read + Seek>(
    state: &mut DemuxState,
    reader: &mut EbmlReader<R>,
    queue: &mut VecDeque<Packet>,
) -> Result<()> {
    let cluster = reader.read_master()?;
    let mut time = 0;
    trace!("Cluster at byte {}", cluster.pos);

    while let Some(id) = reader.next_child(cluster.depth)? {
        match id {
            ids::CLUSTER_TIMECODE => {
                if let Some(timecode) = state.field(reader.read_uint())? {
                    time = timecode;
                }
            }
            ids::SIMPLE_BLOCK => {
                let (data, pos) = reader.read_binary_at()?;
                let source = BlockSource {
                    pos,
                    cluster_pos: cluster.pos,
                    cluster_time: time,
                    keyframe: None,
                    duration: None,
                };
                let result = assemble(state, queue, &data, &source);
                if let Some(Some(block)) = state.recover(result, |e| e)? {
                    if queue[block.first].keyframe {
                        state.note_keyframe(queue[block.first].track_number, cluster.pos, block.start_ns);
                    }
                }
            }
            ids::BLOCK_GROUP => read_block_group(state, reader, queue, cluster.pos, time)?,
            ids::CLUSTER_POSITION | ids::CLUSTER_PREV_SIZE | ids::VOID | ids::CRC32 => reader.skip()?,
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

    Ok(())
}

fn read_block_group<R: Read + Seek>(
    state: &mut DemuxState,
    reader: &mut EbmlReader<R>,
    queue: &mut VecDeque<Packet>,
    cluster_pos: u64,
    cluster_time: u64,
) -> Result<()> {
    let group = reader.read_master()?;
    let mut first_block: Option<Assembled> = None;
    let mut seen_block = false;
    let mut referenced = false;
    let mut duration = None;

    while let Some(id) = reader.next_child(group.depth)? {
        match id {
            ids::BLOCK => {
                let (data, pos) = reader.read_binary_at()?;
                let source = BlockSource {
                    pos,
                    cluster_pos,
                    cluster_time,
                    keyframe: Some(!seen_block && !referenced),
                    duration,
                };
                seen_block = true;
                let result = assemble(state, queue, &data, &source);
                let assembled = state.recover(result, |e| e)?.flatten();
                if first_block.is_none() {
                    first_block = assembled;
                }
            }
            ids::BLOCK_REFERENCE => {
                reader.skip()?;
                referenced = true;
                // Only the first packet of the group ever carries the flag.
                if let Some(block) = first_block {
                    queue[block.first].keyframe = false;
                }
            }
            ids::BLOCK_DURATION => {
                duration = state.field(reader.read_uint())?;
                if let (Some(block), Some(ticks)) = (first_block, duration) {
                    let total = ticks_to_ns(ticks, state.time_scale, block.track_scale);
                    for n in 0..block.count {
                        let (start, length) = lace_timing(block.start_ns, Some(total), block.count, n);
                        let packet = &mut queue[block.first + n];
                        packet.timestamp_ms = start / NS_PER_MS;
                        packet.duration_ms = length.map(|ns| ns / NS_PER_MS);
                    }
                }
            }
            _ => reader.skip()?,
        }
    }

    if let Some(block) = first_block {
        let packet = &queue[block.first];
        if packet.keyframe {
            state.note_keyframe(packet.track_number, cluster_pos, block.start_ns);
        }
    }

    Ok(())
}

/// Block ticks in nanoseconds, through the segment and track scales.
fn ticks_to_ns(ticks: u64, time_scale: u64, track_scale: f64) -> u64 {
    if track_scale == 1.0 {
        ticks.saturating_mul(time_scale)
    } else {
        (ticks as f64 * time_scale as f64 * track_scale) as u64
    }
}

/// Start and duration of lace `n` out of `laces` sharing `total` nanoseconds.
fn lace_timing(start: u64, total: Option<u64>, laces: usize, n: usize) -> (u64, Option<u64>) {
    let Some(total) = total else {
        return (start, None);
    };
    let (total, laces, n) = (u128::from(total), laces as u128, n as u128);
    let offset = total * n / laces;
    let length = total * (n + 1) / laces - offset;
    (
        start.saturating_add(offset as u64),
        Some(length as u64),
    )
}

/// Splits one Block into packets. Returns `None` when nothing was queued.
fn assemble(
    state: &mut DemuxState,
    queue: &mut VecDeque<Packet>,
    data: &[u8],
    source: &BlockSource,
) -> Result<Option<Assembled>> {
    let pos = source.pos;
    let at_pos = |e: DemuxError| match e {
        DemuxError::MalformedLace(msg) => DemuxError::MalformedLace(format!("block at byte {pos}: {msg}")),
        DemuxError::CorruptFrame(msg) => DemuxError::CorruptFrame(format!("block at byte {pos}: {msg}")),
        e => e,
    };

    let Some(header) = BlockHeader::parse(data).map_err(at_pos)? else {
        trace!("Dropping empty block at byte {pos}");
        return Ok(None);
    };

    let track = state
        .track_by_number(header.track)
        .ok_or(DemuxError::UnknownTrack {
            track: header.track,
            pos,
        })?;
    if !track.frame_encoding.is_supported() {
        trace!("Dropping block at byte {pos}: track {} cannot be decoded", header.track);
        return Ok(None);
    }
    let stream_index = track.stream_index;
    let track_type = track.track_type();
    let default_duration = track.default_duration;
    let track_scale = track.time_scale;

    let keyframe = source.keyframe.unwrap_or_else(|| header.is_keyframe());
    // Only SimpleBlocks define the discardable bit.
    let discardable = source.keyframe.is_none() && header.is_discardable();
    let ticks = source
        .cluster_time
        .checked_add_signed(i64::from(header.timecode))
        .unwrap_or(source.cluster_time);
    let start_ns = ticks_to_ns(ticks, state.time_scale, track_scale);

    if track_type != TrackType::Subtitle {
        if let Some(skip_to) = state.skip_to {
            if start_ns / NS_PER_MS < skip_to {
                trace!("Skipping block at byte {pos} before the seek target");
                return Ok(None);
            }
            if keyframe {
                state.skip_to = None;
            }
        }
    }

    let laces = header.split_laces(data).map_err(at_pos)?;
    let count = laces.len();
    let total = source
        .duration
        .map(|ticks| ticks_to_ns(ticks, state.time_scale, track_scale))
        .or_else(|| default_duration.map(|ns| ns.saturating_mul(count as u64)));

    // Decode every lace before queueing so a corrupt one drops the whole Block.
    let mut frames = Vec::with_capacity(count);
    if let Some(track) = state.track_by_number(header.track) {
        for range in laces {
            let frame = track.frame_encoding.decode(&data[range]).map_err(at_pos)?;
            frames.push(frame.into_owned());
        }
    }

    let first = queue.len();
    for (n, frame) in frames.into_iter().enumerate() {
        let (start, length) = lace_timing(start_ns, total, count, n);
        queue.push_back(Packet {
            stream_index,
            track_number: header.track,
            timestamp_ms: start / NS_PER_MS,
            duration_ms: length.map(|ns| ns / NS_PER_MS),
            keyframe: keyframe && n == 0,
            invisible: header.is_invisible(),
            discardable,
            pos,
            data: frame,
        });
    }

    trace!(
        "Block at byte {pos}: track {}, {} ns, {count} lace(s), {} lacing",
        header.track, start_ns, header.lacing
    );

    Ok(Some(Assembled {
        first,
        count,
        start_ns,
        track_scale,
    }))
}
