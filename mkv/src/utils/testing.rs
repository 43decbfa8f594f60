//! In-memory EBML writers used to build test documents.

use crate::structs::ids;

/// Encodes `value` as a vint of exactly `width` bytes.
pub(crate) fn encode_vint_width(value: u64, width: usize) -> Vec<u8> {
    let marked = value | (1u64 << (7 * width));
    marked.to_be_bytes()[8 - width..].to_vec()
}

/// Shortest vint encoding that does not collide with the unknown-length pattern.
pub(crate) fn encode_vint(value: u64) -> Vec<u8> {
    let width = (1..=8)
        .find(|&w| value < (1u64 << (7 * w)) - 1)
        .unwrap_or(8);
    encode_vint_width(value, width)
}

pub(crate) fn encode_id(id: u32) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(3);
    bytes[skip..].to_vec()
}

pub(crate) fn element(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = encode_id(id);
    out.extend(encode_vint(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

pub(crate) fn master(id: u32, children: &[Vec<u8>]) -> Vec<u8> {
    element(id, &children.concat())
}

pub(crate) fn uint(id: u32, value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = (value.leading_zeros() as usize / 8).min(7);
    element(id, &bytes[skip..])
}

pub(crate) fn float(id: u32, value: f64) -> Vec<u8> {
    element(id, &value.to_be_bytes())
}

pub(crate) fn string(id: u32, value: &str) -> Vec<u8> {
    element(id, value.as_bytes())
}

/// Block body: track vint, relative timecode, flags, laced payload.
pub(crate) fn block_body(track: u64, timecode: i16, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = encode_vint(track);
    out.extend_from_slice(&timecode.to_be_bytes());
    out.push(flags);
    out.extend_from_slice(payload);
    out
}

pub(crate) fn ebml_header(doc_type: &str) -> Vec<u8> {
    master(
        ids::EBML_HEADER,
        &[
            uint(ids::EBML_VERSION, 1),
            uint(ids::EBML_READ_VERSION, 1),
            uint(ids::EBML_MAX_ID_LENGTH, 4),
            uint(ids::EBML_MAX_SIZE_LENGTH, 8),
            string(ids::DOC_TYPE, doc_type),
            uint(ids::DOC_TYPE_VERSION, 4),
            uint(ids::DOC_TYPE_READ_VERSION, 2),
        ],
    )
}

pub(crate) fn info(timecode_scale: u64) -> Vec<u8> {
    master(
        ids::INFO,
        &[
            uint(ids::TIMECODE_SCALE, timecode_scale),
            string(ids::MUXING_APP, "test"),
        ],
    )
}

/// 48 kHz stereo PCM track.
pub(crate) fn pcm_track(number: u64) -> Vec<u8> {
    master(
        ids::TRACK_ENTRY,
        &[
            uint(ids::TRACK_NUMBER, number),
            uint(ids::TRACK_UID, number * 1000),
            uint(ids::TRACK_TYPE, 2),
            string(ids::CODEC_ID, "A_PCM/INT/LIT"),
            master(
                ids::TRACK_AUDIO,
                &[
                    uint(ids::AUDIO_CHANNELS, 2),
                    float(ids::AUDIO_SAMPLING_FREQ, 48000.0),
                    uint(ids::AUDIO_BIT_DEPTH, 16),
                ],
            ),
        ],
    )
}

pub(crate) fn block_group(body: Vec<u8>, extra: &[Vec<u8>]) -> Vec<u8> {
    let mut children = vec![element(ids::BLOCK, &body)];
    children.extend_from_slice(extra);
    master(ids::BLOCK_GROUP, &children)
}

pub(crate) fn cluster(timecode: u64, children: &[Vec<u8>]) -> Vec<u8> {
    let mut all = vec![uint(ids::CLUSTER_TIMECODE, timecode)];
    all.extend_from_slice(children);
    master(ids::CLUSTER, &all)
}

pub(crate) fn segment(children: &[Vec<u8>]) -> Vec<u8> {
    master(ids::SEGMENT, children)
}

/// One PCM track and one Cluster holding a single unlaced 4-byte Block.
pub(crate) fn minimal_file() -> Vec<u8> {
    [
        ebml_header("matroska"),
        segment(&[
            info(1_000_000),
            master(ids::TRACKS, &[pcm_track(1)]),
            cluster(0, &[block_group(block_body(1, 0, 0, &[1, 2, 3, 4]), &[])]),
        ]),
    ]
    .concat()
}
