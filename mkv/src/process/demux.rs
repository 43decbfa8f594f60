//! Document-level parsing and packet delivery.
//!
//! The header phase walks the level-1 elements in file order, following the
//! SeekHead to Cues and Tags stored after the media. The packet phase reads
//! one Cluster at a time into a FIFO queue.

use std::collections::VecDeque;
use std::io::{Read, Seek};

use log::Level::Warn;
use log::{Level, debug, error, info, trace, warn};

use crate::log_or_err;
use crate::process::cluster::read_cluster;
use crate::structs::attachment::{Attachment, read_attachments};
use crate::structs::chapters::{Edition, read_chapters};
use crate::structs::cues::{CuePoint, Index, IndexEntry, read_cues};
use crate::structs::header::EbmlHeader;
use crate::structs::ids;
use crate::structs::info::SegmentInfo;
use crate::structs::packet::Packet;
use crate::structs::seekhead::{SeekEntry, read_seek_head};
use crate::structs::tags::{Tag, read_tags};
use crate::structs::track::{Track, read_tracks};
use crate::utils::ebml_reader::{EbmlReader, Level as EbmlLevel};
use crate::utils::errors::{DemuxError, Result};
use crate::utils::vint::UNKNOWN_LENGTH;

const NS_PER_MS: u64 = 1_000_000;

/// Demuxer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemuxOptions {
    /// Allows out-of-order reads: SeekHead targets and [`Demuxer::seek`].
    pub seekable: bool,
    /// Recoverable errors at or above this level abort parsing.
    ///
    /// - `log::Level::Error`: log content errors and continue (default)
    /// - `log::Level::Warn`: fail on content errors too (strict mode)
    pub fail_level: Level,
}

impl Default for DemuxOptions {
    fn default() -> Self {
        Self {
            seekable: true,
            fail_level: Level::Error,
        }
    }
}

/// Everything learned from the document so far.
#[derive(Debug)]
pub struct DemuxState {
    pub(crate) fail_level: Level,
    pub(crate) seekable: bool,
    /// Nanoseconds per tick.
    pub(crate) time_scale: u64,
    /// Offset of the Segment payload; SeekHead and Cues positions are relative to it.
    pub(crate) segment_start: u64,
    pub(crate) segment_level: EbmlLevel,
    pub(crate) segment_depth: usize,
    pub(crate) header: EbmlHeader,
    pub(crate) info: SegmentInfo,
    pub(crate) tracks: Vec<Track>,
    pub(crate) cue_points: Vec<CuePoint>,
    pub(crate) index: Index,
    pub(crate) index_from_cues: bool,
    pub(crate) seek_entries: Vec<SeekEntry>,
    pub(crate) tags: Vec<Tag>,
    pub(crate) chapters: Vec<Edition>,
    pub(crate) attachments: Vec<Attachment>,
    /// Level-1 elements already parsed, by offset.
    pub(crate) parsed_positions: Vec<u64>,
    pub(crate) first_cluster_pos: Option<u64>,
    /// Milliseconds; packets before it are dropped after a seek.
    pub(crate) skip_to: Option<u64>,
}

impl Default for DemuxState {
    fn default() -> Self {
        Self {
            fail_level: Level::Error,
            seekable: true,
            time_scale: crate::structs::info::DEFAULT_TIMECODE_SCALE,
            segment_start: 0,
            segment_level: EbmlLevel {
                start: 0,
                length: UNKNOWN_LENGTH,
            },
            segment_depth: 1,
            header: EbmlHeader::default(),
            info: SegmentInfo::default(),
            tracks: Vec::new(),
            cue_points: Vec::new(),
            index: Index::default(),
            index_from_cues: false,
            seek_entries: Vec::new(),
            tags: Vec::new(),
            chapters: Vec::new(),
            attachments: Vec::new(),
            parsed_positions: Vec::new(),
            first_cluster_pos: None,
            skip_to: None,
        }
    }
}

impl DemuxState {
    /// Keeps structural errors, logs the rest and yields `None` in their place.
    pub(crate) fn field<T>(&self, result: Result<T>) -> Result<Option<T>> {
        self.recover(result, |e| e)
    }

    /// Like [`field`](Self::field), rewrapping content errors with `wrap` first.
    pub(crate) fn recover<T>(
        &self,
        result: Result<T>,
        wrap: impl FnOnce(DemuxError) -> DemuxError,
    ) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_structural() => Err(e),
            Err(e) => {
                let err = wrap(e);
                log_or_err!(self, Warn, err);
                Ok(None)
            }
        }
    }

    pub(crate) fn track_by_number(&self, number: u64) -> Option<&Track> {
        self.tracks.iter().find(|t| t.number == number)
    }

    /// Records a keyframe Cluster when no Cues were available.
    pub(crate) fn note_keyframe(&mut self, track: u64, cluster_pos: u64, time_ns: u64) {
        if self.index_from_cues {
            return;
        }
        if self.index.insert(IndexEntry {
            pos: cluster_pos,
            track,
            time: time_ns,
        }) {
            trace!("Indexed track {track} at {time_ns} ns, cluster at byte {cluster_pos}");
        }
    }

    fn add_tracks(&mut self, tracks: Vec<Track>) -> Result<()> {
        for mut track in tracks {
            if self.track_by_number(track.number).is_some() {
                let err = DemuxError::MalformedTrackField(format!(
                    "duplicate track number {}, entry discarded",
                    track.number
                ));
                log_or_err!(self, Warn, err);
                continue;
            }
            track.stream_index = self.tracks.len();
            self.tracks.push(track);
        }
        Ok(())
    }

    /// Parses the level-1 element at the cursor, once per offset.
    pub(crate) fn parse_level1<R: Read + Seek>(&mut self, reader: &mut EbmlReader<R>, id: u32) -> Result<()> {
        let pos = reader.element_start();
        if self.parsed_positions.contains(&pos) {
            debug!("Element {id:#X} at byte {pos} already parsed");
            return reader.skip();
        }

        match id {
            ids::INFO => {
                let info = SegmentInfo::read(self, reader)?;
                self.time_scale = info.timecode_scale;
                self.info = info;
            }
            ids::TRACKS => {
                let tracks = read_tracks(self, reader)?;
                self.add_tracks(tracks)?;
            }
            ids::CUES => {
                let cues = read_cues(self, reader)?;
                self.cue_points.extend(cues);
            }
            ids::SEEK_HEAD => {
                let entries = read_seek_head(self, reader)?;
                self.seek_entries.extend(entries);
            }
            ids::TAGS => {
                let tags = read_tags(self, reader)?;
                self.tags.extend(tags);
            }
            ids::CHAPTERS => {
                let editions = read_chapters(self, reader)?;
                self.chapters.extend(editions);
            }
            ids::ATTACHMENTS => {
                let attachments = read_attachments(self, reader)?;
                self.attachments.extend(attachments);
            }
            ids::VOID | ids::CRC32 => reader.skip()?,
            _ => {
                debug!("{}", DemuxError::UnknownElement { id, pos });
                reader.skip()?;
            }
        }

        self.parsed_positions.push(pos);
        Ok(())
    }

    /// Parses the Cues and Tags the SeekHead points at, if not seen yet.
    pub(crate) fn execute_seek_head<R: Read + Seek>(&mut self, reader: &mut EbmlReader<R>) -> Result<()> {
        if !self.seekable {
            return Ok(());
        }

        let targets: Vec<SeekEntry> = self
            .seek_entries
            .iter()
            .filter(|entry| entry.is_side_parsed())
            .copied()
            .collect();

        for entry in targets {
            let pos = self.segment_start.saturating_add(entry.position);
            if self.parsed_positions.contains(&pos) {
                continue;
            }
            if let Err(e) = self.side_parse(reader, entry, pos) {
                log_or_err!(self, Warn, e);
            }
        }

        Ok(())
    }

    /// Parses one SeekHead target out of order. The guard puts the cursor
    /// back on every exit path. Side parses never start further side parses.
    fn side_parse<R: Read + Seek>(&mut self, reader: &mut EbmlReader<R>, entry: SeekEntry, pos: u64) -> Result<()> {
        let mut guard = reader.guard();
        guard.seek_to(pos)?;
        guard.push_level(EbmlLevel {
            start: 0,
            length: UNKNOWN_LENGTH,
        })?;

        let (found, _) = guard.peek_id()?;
        if found != entry.id {
            return Err(DemuxError::SeekTargetMismatch {
                expected: entry.id,
                found,
                pos,
            });
        }

        self.parse_level1(&mut *guard, found)?;
        info!("Parsed element {found:#X} at byte {pos} through the SeekHead");
        Ok(())
    }

    fn build_index(&mut self) {
        if self.cue_points.is_empty() {
            return;
        }

        let known: Vec<CuePoint> = self
            .cue_points
            .iter()
            .filter(|cue| self.track_by_number(cue.track).is_some())
            .copied()
            .collect();
        let mut index = Index::from_cues(&known, self.segment_start, self.time_scale);
        if index.sanity_check(&self.cue_points, self.time_scale) {
            self.index_from_cues = !index.is_empty();
        }
        debug!("Index holds {} entries", index.len());
        self.index = index;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Probing,
    Packets,
    Done,
}

/// Pull-based Matroska demuxer.
///
/// [`read_header`](Self::read_header) parses everything up to the first
/// Cluster; [`read_packet`](Self::read_packet) then yields one lace at a
/// time, reading a Cluster whenever the queue runs dry.
#[derive(Debug)]
pub struct Demuxer<R> {
    reader: EbmlReader<R>,
    state: DemuxState,
    queue: VecDeque<Packet>,
    phase: Phase,
}

impl<R: Read + Seek> Demuxer<R> {
    pub fn new(inner: R) -> Result<Self> {
        Self::with_options(inner, DemuxOptions::default())
    }

    pub fn with_options(inner: R, options: DemuxOptions) -> Result<Self> {
        Ok(Self {
            reader: EbmlReader::new(inner)?,
            state: DemuxState {
                fail_level: options.fail_level,
                seekable: options.seekable,
                ..Default::default()
            },
            queue: VecDeque::new(),
            phase: Phase::Probing,
        })
    }

    /// Creates a demuxer and reads the header.
    pub fn open(inner: R) -> Result<Self> {
        let mut demuxer = Self::new(inner)?;
        demuxer.read_header()?;
        Ok(demuxer)
    }

    /// Reads the EBML header and every level-1 element before the first
    /// Cluster, leaving the cursor at that Cluster.
    ///
    /// Running out of data here is reported as [`DemuxError::TruncatedStream`].
    /// After a failure, whatever was parsed stays available through the
    /// accessors and no packets are delivered.
    pub fn read_header(&mut self) -> Result<()> {
        if self.phase != Phase::Probing {
            return Ok(());
        }

        match self.parse_header() {
            Ok(()) => {
                self.phase = Phase::Packets;
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Done;
                Err(match e {
                    DemuxError::EndOfStream => DemuxError::TruncatedStream(self.reader.position()),
                    e => e,
                })
            }
        }
    }

    fn parse_header(&mut self) -> Result<()> {
        self.state.header = EbmlHeader::read(&mut self.reader)?;
        debug!(
            "EBML header: doc type {} version {}",
            self.state.header.doc_type, self.state.header.doc_type_version
        );

        let segment = loop {
            let (id, _) = self.reader.peek_id()?;
            match id {
                ids::VOID | ids::CRC32 => self.reader.skip()?,
                ids::SEGMENT => break self.reader.read_master_unsized()?,
                _ => return Err(DemuxError::MissingSegment(id)),
            }
        };

        self.state.segment_start = self.reader.position();
        self.state.segment_depth = segment.depth;
        if let Some(level) = self.reader.levels().last() {
            self.state.segment_level = *level;
        }
        let unknown_length = self.state.segment_level.length == UNKNOWN_LENGTH;
        debug!(
            "Segment at byte {}, payload from {}{}",
            segment.pos,
            self.state.segment_start,
            if unknown_length { ", unknown length" } else { "" }
        );

        loop {
            let id = match self.reader.next_child(segment.depth) {
                Ok(Some(id)) => id,
                Ok(None) => break,
                Err(DemuxError::EndOfStream) if unknown_length => break,
                Err(e) => return Err(e),
            };
            if id == ids::CLUSTER {
                self.state.first_cluster_pos = Some(self.reader.element_start());
                break;
            }
            self.state.parse_level1(&mut self.reader, id)?;
        }

        self.state.execute_seek_head(&mut self.reader)?;
        self.state.build_index();

        if self.state.tracks.is_empty() {
            warn!("No usable tracks found");
        }
        info!(
            "Header read: {} track(s), {} index entries",
            self.state.tracks.len(),
            self.state.index.len()
        );
        Ok(())
    }

    /// Returns the next packet, or [`DemuxError::EndOfStream`] once the
    /// stream is exhausted or parsing stopped.
    ///
    /// Errors that stop parsing are logged and end the stream, unless the
    /// fail level is `Warn` or lower, in which case they are returned once.
    pub fn read_packet(&mut self) -> Result<Packet> {
        loop {
            if let Some(packet) = self.queue.pop_front() {
                return Ok(packet);
            }

            match self.phase {
                Phase::Probing => return Err(DemuxError::HeaderNotRead),
                Phase::Done => return Err(DemuxError::EndOfStream),
                Phase::Packets => {}
            }

            if let Err(e) = self.next_cluster() {
                self.phase = Phase::Done;
                match e {
                    DemuxError::EndOfStream => {
                        debug!("End of stream at byte {}", self.reader.position())
                    }
                    e if self.state.fail_level >= Warn => return Err(e),
                    e => error!("Stopping at byte {}: {e}", self.reader.position()),
                }
            }
        }
    }

    /// Reads Clusters until one is found, skipping other level-1 elements.
    fn next_cluster(&mut self) -> Result<()> {
        loop {
            let Some(id) = self.reader.next_child(self.state.segment_depth)? else {
                return Err(DemuxError::EndOfStream);
            };
            if id == ids::CLUSTER {
                return read_cluster(&mut self.state, &mut self.reader, &mut self.queue);
            }
            trace!("Skipping level-1 element {id:#X} at byte {}", self.reader.element_start());
            self.reader.skip()?;
        }
    }

    /// Puts the level stack back to "inside the Segment".
    fn reenter_segment(&mut self) -> Result<()> {
        self.reader.truncate_levels(self.state.segment_depth - 1);
        self.reader.push_level(self.state.segment_level)?;
        Ok(())
    }

    /// Moves to the Cluster holding the last keyframe of `stream_index` at or
    /// before `timestamp_ms`.
    ///
    /// Uses the Cues when present. Otherwise Clusters are read from the last
    /// known keyframe onwards until one past the target turns up.
    pub fn seek(&mut self, stream_index: usize, timestamp_ms: u64) -> Result<()> {
        if self.phase == Phase::Probing {
            return Err(DemuxError::HeaderNotRead);
        }
        if !self.state.seekable {
            return Err(DemuxError::NotSeekable);
        }
        let track = self
            .state
            .tracks
            .get(stream_index)
            .ok_or(DemuxError::InvalidStreamIndex(stream_index))?
            .number;
        let target = timestamp_ms.saturating_mul(NS_PER_MS);

        if !self.state.index_from_cues {
            self.scan_clusters(track, target)?;
        }

        let Some(entry) = self.state.index.search(track, target).copied() else {
            warn!("No seek points for stream {stream_index}");
            return Err(DemuxError::NotSeekable);
        };

        debug!(
            "Seeking stream {stream_index} to {timestamp_ms} ms: cluster at byte {} ({} ns)",
            entry.pos, entry.time
        );
        self.queue.clear();
        self.reenter_segment()?;
        self.reader.seek_to(entry.pos)?;
        self.state.skip_to = Some(entry.time / NS_PER_MS);
        self.phase = Phase::Packets;
        Ok(())
    }

    fn scan_clusters(&mut self, track: u64, target: u64) -> Result<()> {
        let past_target = |index: &Index| index.last_for(track).is_some_and(|e| e.time > target);
        if past_target(&self.state.index) {
            return Ok(());
        }
        let Some(start) = self
            .state
            .index
            .last_for(track)
            .map(|e| e.pos)
            .or(self.state.first_cluster_pos)
        else {
            return Ok(());
        };

        let skip_to = self.state.skip_to.take();
        let mut scratch = VecDeque::new();
        {
            let mut guard = self.reader.guard();
            guard.truncate_levels(self.state.segment_depth - 1);
            guard.push_level(self.state.segment_level)?;
            guard.seek_to(start)?;

            while !past_target(&self.state.index) {
                let id = match guard.next_child(self.state.segment_depth) {
                    Ok(Some(id)) => id,
                    Ok(None) | Err(DemuxError::EndOfStream) => break,
                    Err(e) => {
                        debug!("Cluster scan stopped: {e}");
                        break;
                    }
                };
                let scanned = if id == ids::CLUSTER {
                    read_cluster(&mut self.state, &mut *guard, &mut scratch)
                } else {
                    guard.skip()
                };
                if let Err(e) = scanned {
                    debug!("Cluster scan stopped: {e}");
                    break;
                }
                scratch.clear();
            }
        }
        self.state.skip_to = skip_to;
        Ok(())
    }

    /// Offset of the next element to be read.
    pub fn position(&self) -> u64 {
        self.reader.element_start()
    }

    pub fn segment_start(&self) -> u64 {
        self.state.segment_start
    }

    pub fn header(&self) -> &EbmlHeader {
        &self.state.header
    }

    pub fn info(&self) -> &SegmentInfo {
        &self.state.info
    }

    pub fn tracks(&self) -> &[Track] {
        &self.state.tracks
    }

    pub fn index(&self) -> &Index {
        &self.state.index
    }

    pub fn seek_entries(&self) -> &[SeekEntry] {
        &self.state.seek_entries
    }

    pub fn tags(&self) -> &[Tag] {
        &self.state.tags
    }

    pub fn chapters(&self) -> &[Edition] {
        &self.state.chapters
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.state.attachments
    }

    /// Releases the demuxer, dropping any packets not yet delivered.
    pub fn close(self) {
        if !self.queue.is_empty() {
            debug!("Closing with {} undelivered packet(s)", self.queue.len());
        }
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R: Read + Seek> Iterator for Demuxer<R> {
    type Item = Result<Packet>;

    /// Reads the header first if needed; ends at [`DemuxError::EndOfStream`].
    fn next(&mut self) -> Option<Self::Item> {
        if self.phase == Phase::Probing {
            if let Err(e) = self.read_header() {
                return Some(Err(e));
            }
        }
        match self.read_packet() {
            Err(DemuxError::EndOfStream) => None,
            result => Some(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::track::TrackType;
    use crate::utils::testing::*;
    use std::io::Cursor;

    type TestDemuxer = Demuxer<Cursor<Vec<u8>>>;

    fn file(children: &[Vec<u8>]) -> Vec<u8> {
        [ebml_header("matroska"), segment(children)].concat()
    }

    fn tracks() -> Vec<u8> {
        master(ids::TRACKS, &[pcm_track(1)])
    }

    fn simple_block(track: u64, timecode: i16, flags: u8, payload: &[u8]) -> Vec<u8> {
        element(ids::SIMPLE_BLOCK, &block_body(track, timecode, flags, payload))
    }

    fn seek_head(targets: &[(u32, u64)]) -> Vec<u8> {
        let seeks: Vec<_> = targets
            .iter()
            .map(|&(id, pos)| {
                master(
                    ids::SEEK,
                    &[
                        element(ids::SEEK_ID, &encode_id(id)),
                        element(ids::SEEK_POSITION, &pos.to_be_bytes()),
                    ],
                )
            })
            .collect();
        master(ids::SEEK_HEAD, &seeks)
    }

    /// Cluster positions are written with 8 bytes so the size does not
    /// depend on them.
    fn cues(points: &[(u64, u64, u64)]) -> Vec<u8> {
        let points: Vec<_> = points
            .iter()
            .map(|&(time, track, pos)| {
                master(
                    ids::CUE_POINT,
                    &[
                        uint(ids::CUE_TIME, time),
                        master(
                            ids::CUE_TRACK_POSITIONS,
                            &[
                                uint(ids::CUE_TRACK, track),
                                element(ids::CUE_CLUSTER_POSITION, &pos.to_be_bytes()),
                            ],
                        ),
                    ],
                )
            })
            .collect();
        master(ids::CUES, &points)
    }

    fn drain(demuxer: &mut TestDemuxer) -> Result<Vec<Packet>> {
        let mut packets = Vec::new();
        loop {
            match demuxer.read_packet() {
                Ok(packet) => packets.push(packet),
                Err(DemuxError::EndOfStream) => return Ok(packets),
                Err(e) => return Err(e),
            }
        }
    }

    fn timestamps(packets: &[Packet]) -> Vec<u64> {
        packets.iter().map(|p| p.timestamp_ms).collect()
    }

    #[test]
    fn minimal_file_scenario() -> anyhow::Result<()> {
        let mut demuxer = Demuxer::open(Cursor::new(minimal_file()))?;

        assert_eq!(demuxer.header().doc_type, "matroska");
        assert_eq!(demuxer.info().timecode_scale, 1_000_000);
        assert_eq!(demuxer.info().muxing_app.as_deref(), Some("test"));
        assert_eq!(demuxer.tracks().len(), 1);

        let track = &demuxer.tracks()[0];
        assert_eq!(track.track_type(), TrackType::Audio);
        assert_eq!(track.stream_index, 0);
        let audio = track.audio().unwrap();
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.sampling_frequency, 48000.0);

        let packet = demuxer.read_packet()?;
        assert_eq!(packet.stream_index, 0);
        assert_eq!(packet.timestamp_ms, 0);
        assert_eq!(packet.data, [1, 2, 3, 4]);
        assert!(packet.keyframe);

        assert!(matches!(demuxer.read_packet(), Err(DemuxError::EndOfStream)));
        assert!(matches!(demuxer.read_packet(), Err(DemuxError::EndOfStream)));
        demuxer.close();
        Ok(())
    }

    #[test]
    fn header_must_be_read_first() -> anyhow::Result<()> {
        let mut demuxer = Demuxer::new(Cursor::new(minimal_file()))?;
        assert!(matches!(demuxer.read_packet(), Err(DemuxError::HeaderNotRead)));
        assert!(matches!(demuxer.seek(0, 0), Err(DemuxError::HeaderNotRead)));
        Ok(())
    }

    #[test]
    fn iterator_reads_header_lazily() -> anyhow::Result<()> {
        let demuxer = Demuxer::new(Cursor::new(minimal_file()))?;
        let packets = demuxer.collect::<Result<Vec<_>>>()?;
        assert_eq!(packets.len(), 1);
        Ok(())
    }

    #[test]
    fn webm_documents() -> anyhow::Result<()> {
        let data = [
            ebml_header("webm"),
            segment(&[
                info(1_000_000),
                tracks(),
                cluster(0, &[simple_block(1, 0, 0x80, &[9])]),
            ]),
        ]
        .concat();
        let mut demuxer = Demuxer::open(Cursor::new(data))?;
        assert_eq!(demuxer.header().doc_type, "webm");
        assert_eq!(drain(&mut demuxer)?.len(), 1);
        Ok(())
    }

    #[test]
    fn missing_segment() {
        let data = [ebml_header("matroska"), info(1_000_000)].concat();
        let mut demuxer = Demuxer::new(Cursor::new(data)).unwrap();
        assert!(matches!(
            demuxer.read_header(),
            Err(DemuxError::MissingSegment(ids::INFO))
        ));
    }

    #[test]
    fn truncated_header() {
        let data = minimal_file();
        let mut demuxer = Demuxer::new(Cursor::new(data[..data.len() - 40].to_vec())).unwrap();
        assert!(matches!(
            demuxer.read_header(),
            Err(DemuxError::TruncatedStream(_))
        ));
        assert!(matches!(demuxer.read_packet(), Err(DemuxError::EndOfStream)));
    }

    #[test]
    fn keyframe_back_patch() -> anyhow::Result<()> {
        let reference = element(ids::BLOCK_REFERENCE, &[0xFE]);
        let data = file(&[
            info(1_000_000),
            tracks(),
            cluster(
                0,
                &[
                    block_group(block_body(1, 0, 0, &[1, 1]), &[reference.clone()]),
                    master(
                        ids::BLOCK_GROUP,
                        &[reference, element(ids::BLOCK, &block_body(1, 20, 0, &[2, 2]))],
                    ),
                    block_group(block_body(1, 40, 0, &[3, 3]), &[]),
                ],
            ),
        ]);
        let mut demuxer = Demuxer::open(Cursor::new(data))?;
        let packets = drain(&mut demuxer)?;

        let keyframes: Vec<_> = packets.iter().map(|p| p.keyframe).collect();
        assert_eq!(keyframes, [false, false, true]);
        assert_eq!(timestamps(&packets), [0, 20, 40]);
        Ok(())
    }

    #[test]
    fn corrupt_block_with_valid_sibling() -> anyhow::Result<()> {
        let data = file(&[
            info(1_000_000),
            tracks(),
            cluster(
                100,
                &[
                    block_group(block_body(9, 0, 0, &[0xBA, 0xD0]), &[]),
                    block_group(block_body(1, 5, 0, &[7, 7, 7, 7]), &[]),
                ],
            ),
        ]);

        let mut demuxer = Demuxer::open(Cursor::new(data.clone()))?;
        let packet = demuxer.read_packet()?;
        assert_eq!(packet.timestamp_ms, 105);
        assert_eq!(packet.data, [7, 7, 7, 7]);
        assert!(packet.keyframe);
        assert!(matches!(demuxer.read_packet(), Err(DemuxError::EndOfStream)));

        let strict = DemuxOptions {
            fail_level: Level::Warn,
            ..Default::default()
        };
        let mut demuxer = Demuxer::with_options(Cursor::new(data), strict)?;
        demuxer.read_header()?;
        assert!(matches!(
            demuxer.read_packet(),
            Err(DemuxError::UnknownTrack { track: 9, .. })
        ));
        assert!(matches!(demuxer.read_packet(), Err(DemuxError::EndOfStream)));
        Ok(())
    }

    #[test]
    fn laced_blocks() -> anyhow::Result<()> {
        // Xiph: 2 laces, the first 2 bytes long.
        let xiph = block_body(1, 0, 0x02, &[1, 2, 0xA, 0xA, 0xB, 0xB, 0xB]);
        // Fixed: 2 laces of 2 bytes.
        let fixed = [0x84, 1, 3, 3, 4, 4];
        let data = file(&[
            info(1_000_000),
            tracks(),
            cluster(
                0,
                &[
                    block_group(xiph, &[uint(ids::BLOCK_DURATION, 10)]),
                    element(ids::SIMPLE_BLOCK, &block_body(1, 20, fixed[0], &fixed[1..])),
                ],
            ),
        ]);
        let mut demuxer = Demuxer::open(Cursor::new(data))?;
        let packets = drain(&mut demuxer)?;

        assert_eq!(packets.len(), 4);
        assert_eq!(packets[0].data, [0xA, 0xA]);
        assert_eq!(packets[1].data, [0xB, 0xB, 0xB]);
        assert_eq!(timestamps(&packets), [0, 5, 20, 20]);
        assert_eq!(packets[0].duration_ms, Some(5));
        assert_eq!(packets[1].duration_ms, Some(5));
        assert_eq!(packets[2].duration_ms, None);

        let keyframes: Vec<_> = packets.iter().map(|p| p.keyframe).collect();
        assert_eq!(keyframes, [true, false, true, false]);
        assert_eq!(packets[2].data, [3, 3]);
        assert_eq!(packets[3].data, [4, 4]);
        assert_eq!(packets[2].pos, packets[3].pos);
        Ok(())
    }

    #[test]
    fn negative_timecode_is_clamped() -> anyhow::Result<()> {
        let data = file(&[
            info(1_000_000),
            tracks(),
            cluster(10, &[simple_block(1, -50, 0x80, &[0; 2]), simple_block(1, -4, 0x80, &[0; 2])]),
        ]);
        let mut demuxer = Demuxer::open(Cursor::new(data))?;
        assert_eq!(timestamps(&drain(&mut demuxer)?), [10, 6]);
        Ok(())
    }

    #[test]
    fn seek_head_round_trip() -> anyhow::Result<()> {
        let head_len = seek_head(&[(ids::CUES, 0)]).len();
        let segment_info = info(1_000_000);
        let track_list = tracks();
        let first = cluster(0, &[simple_block(1, 0, 0x80, &[1])]);
        let second = cluster(1000, &[simple_block(1, 0, 0x80, &[2])]);

        let first_pos = (head_len + segment_info.len() + track_list.len()) as u64;
        let second_pos = first_pos + first.len() as u64;
        let cues_pos = second_pos + second.len() as u64;
        let points = [(0, 1, first_pos), (1000, 1, second_pos)];

        let data = file(&[
            seek_head(&[(ids::CUES, cues_pos)]),
            segment_info,
            track_list,
            first,
            second,
            cues(&points),
        ]);
        let mut demuxer = Demuxer::open(Cursor::new(data))?;

        let relative = |demuxer: &TestDemuxer| -> Vec<(u64, u64, u64)> {
            demuxer
                .index()
                .entries()
                .iter()
                .map(|e| (e.pos - demuxer.segment_start(), e.track, e.time))
                .collect()
        };
        let entries = relative(&demuxer);
        assert_eq!(entries, [(first_pos, 1, 0), (second_pos, 1, 1_000_000_000)]);

        // The same Cues met in document order.
        let in_order = file(&[info(1_000_000), tracks(), cues(&points)]);
        let mut reference = Demuxer::open(Cursor::new(in_order))?;
        assert!(drain(&mut reference)?.is_empty());
        assert_eq!(entries, relative(&reference));

        assert_eq!(demuxer.position(), demuxer.segment_start() + first_pos);
        let packets = drain(&mut demuxer)?;
        assert_eq!(timestamps(&packets), [0, 1000]);
        Ok(())
    }

    #[test]
    fn seek_target_mismatch() -> anyhow::Result<()> {
        let head_len = seek_head(&[(ids::CUES, 0)]).len();
        let cluster_pos = (head_len + info(1_000_000).len() + tracks().len()) as u64;
        let build = || {
            file(&[
                seek_head(&[(ids::CUES, cluster_pos)]),
                info(1_000_000),
                tracks(),
                cluster(0, &[simple_block(1, 0, 0x80, &[1])]),
            ])
        };

        let mut demuxer = Demuxer::open(Cursor::new(build()))?;
        assert!(demuxer.index().is_empty());
        assert_eq!(drain(&mut demuxer)?.len(), 1);

        let strict = DemuxOptions {
            fail_level: Level::Warn,
            ..Default::default()
        };
        let mut demuxer = Demuxer::with_options(Cursor::new(build()), strict)?;
        assert!(matches!(
            demuxer.read_header(),
            Err(DemuxError::SeekTargetMismatch {
                expected: ids::CUES,
                found: ids::CLUSTER,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn seek_head_reaches_trailing_tags() -> anyhow::Result<()> {
        let head_len = seek_head(&[(ids::TAGS, 0)]).len();
        let segment_info = info(1_000_000);
        let track_list = tracks();
        let body = cluster(0, &[simple_block(1, 0, 0x80, &[1])]);
        let tags_pos = (head_len + segment_info.len() + track_list.len() + body.len()) as u64;
        let tags = master(
            ids::TAGS,
            &[master(
                ids::TAG,
                &[master(
                    ids::SIMPLE_TAG,
                    &[string(ids::TAG_NAME, "TITLE"), string(ids::TAG_STRING, "Trailer")],
                )],
            )],
        );
        let build = || {
            file(&[
                seek_head(&[(ids::TAGS, tags_pos)]),
                info(1_000_000),
                tracks(),
                body.clone(),
                tags.clone(),
            ])
        };

        let mut demuxer = Demuxer::open(Cursor::new(build()))?;
        assert_eq!(demuxer.tags().len(), 1);
        assert_eq!(demuxer.tags()[0].get("title"), Some("Trailer"));
        assert_eq!(demuxer.position(), demuxer.segment_start() + tags_pos - body.len() as u64);
        assert_eq!(drain(&mut demuxer)?.len(), 1);
        // Skipped when the packet loop walks past it.
        assert_eq!(demuxer.tags().len(), 1);

        let streaming = DemuxOptions {
            seekable: false,
            ..Default::default()
        };
        let mut demuxer = Demuxer::with_options(Cursor::new(build()), streaming)?;
        demuxer.read_header()?;
        assert!(demuxer.tags().is_empty());
        Ok(())
    }

    #[test]
    fn track_time_scale_applies_to_blocks() -> anyhow::Result<()> {
        let scaled = |scale: f64| {
            master(
                ids::TRACKS,
                &[master(
                    ids::TRACK_ENTRY,
                    &[
                        uint(ids::TRACK_NUMBER, 1),
                        uint(ids::TRACK_TYPE, 2),
                        string(ids::CODEC_ID, "A_PCM/INT/LIT"),
                        float(ids::TRACK_TIMECODE_SCALE, scale),
                    ],
                )],
            )
        };
        let clusters = || {
            [
                cluster(100, &[simple_block(1, 0, 0x80, &[1])]),
                cluster(
                    200,
                    &[block_group(block_body(1, 0, 0, &[2]), &[uint(ids::BLOCK_DURATION, 10)])],
                ),
            ]
        };

        let [first, second] = clusters();
        let data = file(&[info(1_000_000), scaled(2.0), first, second]);
        let packets = drain(&mut Demuxer::open(Cursor::new(data))?)?;
        assert_eq!(timestamps(&packets), [200, 400]);
        assert_eq!(packets[1].duration_ms, Some(20));

        let [first, second] = clusters();
        let data = file(&[info(1_000_000), scaled(0.001), first, second]);
        let packets = drain(&mut Demuxer::open(Cursor::new(data))?)?;
        assert_eq!(timestamps(&packets), [100, 200]);
        assert_eq!(packets[1].duration_ms, Some(10));
        Ok(())
    }

    #[test]
    fn encoded_tracks() -> anyhow::Result<()> {
        let encoded = |number: u64, algo: u64| {
            master(
                ids::TRACK_ENTRY,
                &[
                    uint(ids::TRACK_NUMBER, number),
                    uint(ids::TRACK_TYPE, 2),
                    string(ids::CODEC_ID, "A_PCM/INT/LIT"),
                    master(
                        ids::CONTENT_ENCODINGS,
                        &[master(
                            ids::CONTENT_ENCODING,
                            &[master(
                                ids::CONTENT_COMPRESSION,
                                &[
                                    uint(ids::CONTENT_COMP_ALGO, algo),
                                    element(ids::CONTENT_COMP_SETTINGS, &[0xAA]),
                                ],
                            )],
                        )],
                    ),
                ],
            )
        };
        let build = || {
            file(&[
                info(1_000_000),
                master(ids::TRACKS, &[encoded(1, 3), encoded(2, 2)]),
                cluster(
                    0,
                    &[
                        simple_block(1, 0, 0x80, &[1, 2]),
                        simple_block(2, 0, 0x80, &[3, 4]),
                        // Xiph lacing, two frames.
                        simple_block(1, 1, 0x82, &[1, 1, 5, 6]),
                    ],
                ),
            ])
        };

        let packets = drain(&mut Demuxer::open(Cursor::new(build()))?)?;
        let frames: Vec<_> = packets.iter().map(|p| (p.track_number, p.data.clone())).collect();
        assert_eq!(
            frames,
            [(1, vec![0xAA, 1, 2]), (1, vec![0xAA, 5]), (1, vec![0xAA, 6])]
        );

        let strict = DemuxOptions {
            fail_level: Level::Warn,
            ..Default::default()
        };
        let mut demuxer = Demuxer::with_options(Cursor::new(build()), strict)?;
        assert!(matches!(
            demuxer.read_header(),
            Err(DemuxError::UnsupportedEncoding(_))
        ));
        Ok(())
    }

    #[test]
    fn packet_flags() -> anyhow::Result<()> {
        let data = file(&[
            info(1_000_000),
            tracks(),
            cluster(
                0,
                &[
                    simple_block(1, 0, 0x80 | 0x08 | 0x01, &[1]),
                    simple_block(1, 1, 0, &[2]),
                    block_group(block_body(1, 2, 0x09, &[3]), &[]),
                ],
            ),
        ]);
        let packets = drain(&mut Demuxer::open(Cursor::new(data))?)?;
        let flags: Vec<_> = packets
            .iter()
            .map(|p| (p.keyframe, p.invisible, p.discardable))
            .collect();
        assert_eq!(
            flags,
            [(true, true, true), (false, false, false), (true, true, false)]
        );
        Ok(())
    }

    #[test]
    fn depth_bound_keeps_parsed_tracks() -> anyhow::Result<()> {
        let mut nested = master(ids::SIMPLE_TAG, &[string(ids::TAG_NAME, "LEAF")]);
        for _ in 0..20 {
            nested = master(ids::SIMPLE_TAG, &[string(ids::TAG_NAME, "NODE"), nested]);
        }
        let data = file(&[
            info(1_000_000),
            tracks(),
            master(ids::TAGS, &[master(ids::TAG, &[nested])]),
            cluster(0, &[simple_block(1, 0, 0x80, &[1])]),
        ]);

        let mut demuxer = Demuxer::new(Cursor::new(data))?;
        assert!(matches!(
            demuxer.read_header(),
            Err(DemuxError::DepthExceeded(16))
        ));
        assert_eq!(demuxer.tracks().len(), 1);
        assert!(matches!(demuxer.read_packet(), Err(DemuxError::EndOfStream)));
        Ok(())
    }

    #[test]
    fn unknown_length_segment() -> anyhow::Result<()> {
        let mut data = ebml_header("matroska");
        data.extend(encode_id(ids::SEGMENT));
        data.extend([0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        data.extend(info(1_000_000));
        data.extend(tracks());
        data.extend(cluster(0, &[simple_block(1, 0, 0x80, &[1])]));
        data.extend(cluster(40, &[simple_block(1, 0, 0x80, &[2])]));

        let mut demuxer = Demuxer::open(Cursor::new(data))?;
        assert_eq!(timestamps(&drain(&mut demuxer)?), [0, 40]);
        Ok(())
    }

    #[test]
    fn truncated_cluster_ends_stream() -> anyhow::Result<()> {
        let mut data = file(&[
            info(1_000_000),
            tracks(),
            cluster(0, &[simple_block(1, 0, 0x80, &[1, 2])]),
            cluster(
                1000,
                &[
                    simple_block(1, 0, 0x80, &[3, 4]),
                    simple_block(1, 10, 0, &[5, 6, 7, 8]),
                ],
            ),
        ]);
        data.truncate(data.len() - 2);

        let mut demuxer = Demuxer::open(Cursor::new(data))?;
        let packets = drain(&mut demuxer)?;
        assert_eq!(timestamps(&packets), [0, 1000]);
        Ok(())
    }

    fn three_clusters(with_cues: bool) -> Vec<u8> {
        let head = vec![info(1_000_000), tracks()];
        let clusters: Vec<_> = (0..3u8)
            .map(|i| {
                cluster(
                    u64::from(i) * 1000,
                    &[
                        simple_block(1, 0, 0x80, &[i]),
                        simple_block(1, 500, 0, &[i + 10]),
                    ],
                )
            })
            .collect();

        let mut children = head.clone();
        if with_cues {
            let placeholder = cues(&[(0, 1, 0), (1000, 1, 0), (2000, 1, 0)]);
            let mut pos = (head.iter().map(Vec::len).sum::<usize>() + placeholder.len()) as u64;
            let mut points = Vec::new();
            for (i, cluster) in clusters.iter().enumerate() {
                points.push((i as u64 * 1000, 1, pos));
                pos += cluster.len() as u64;
            }
            children.push(cues(&points));
        }
        children.extend(clusters);
        file(&children)
    }

    #[test]
    fn seek_with_cues() -> anyhow::Result<()> {
        let mut demuxer = Demuxer::open(Cursor::new(three_clusters(true)))?;
        assert_eq!(demuxer.index().len(), 3);

        assert_eq!(demuxer.read_packet()?.timestamp_ms, 0);
        demuxer.seek(0, 1500)?;
        let packets = drain(&mut demuxer)?;
        assert_eq!(timestamps(&packets), [1000, 1500, 2000, 2500]);
        assert!(packets[0].keyframe);

        demuxer.seek(0, 0)?;
        assert_eq!(drain(&mut demuxer)?.len(), 6);

        assert!(matches!(
            demuxer.seek(5, 0),
            Err(DemuxError::InvalidStreamIndex(5))
        ));
        Ok(())
    }

    #[test]
    fn seek_by_scanning_clusters() -> anyhow::Result<()> {
        let mut demuxer = Demuxer::open(Cursor::new(three_clusters(false)))?;
        assert!(demuxer.index().is_empty());

        demuxer.seek(0, 1500)?;
        assert_eq!(timestamps(&drain(&mut demuxer)?), [1000, 1500, 2000, 2500]);
        assert_eq!(demuxer.index().len(), 3);

        demuxer.seek(0, 0)?;
        assert_eq!(
            timestamps(&drain(&mut demuxer)?),
            [0, 500, 1000, 1500, 2000, 2500]
        );
        Ok(())
    }

    #[test]
    fn non_seekable_input() -> anyhow::Result<()> {
        let head_len = seek_head(&[(ids::CUES, 0)]).len();
        let segment_info = info(1_000_000);
        let track_list = tracks();
        let only = cluster(0, &[simple_block(1, 0, 0x80, &[1])]);
        let cluster_pos = (head_len + segment_info.len() + track_list.len()) as u64;
        let cues_pos = cluster_pos + only.len() as u64;
        let data = file(&[
            seek_head(&[(ids::CUES, cues_pos)]),
            segment_info,
            track_list,
            only,
            cues(&[(0, 1, cluster_pos)]),
        ]);

        let options = DemuxOptions {
            seekable: false,
            ..Default::default()
        };
        let mut demuxer = Demuxer::with_options(Cursor::new(data), options)?;
        demuxer.read_header()?;
        assert!(demuxer.index().is_empty());
        assert_eq!(demuxer.seek_entries().len(), 1);
        assert!(matches!(demuxer.seek(0, 0), Err(DemuxError::NotSeekable)));
        assert_eq!(drain(&mut demuxer)?.len(), 1);
        Ok(())
    }
}
