//! Content sniffing.

use crate::structs::header::DOC_TYPES;
use crate::structs::ids;
use crate::utils::vint::{MAX_LENGTH_WIDTH, is_all_ones, vint_from_slice};

/// Certain match.
pub const PROBE_SCORE_MAX: u32 = 100;

/// Well-formed EBML header of an unknown document type.
pub const PROBE_SCORE_EXTENSION: u32 = 50;

/// Scores how likely `buf` is the start of a Matroska file.
///
/// The buffer must hold the whole EBML header; the doc type is matched as a
/// plain substring of the header payload.
pub fn probe(buf: &[u8]) -> u32 {
    if buf.len() < 5 || buf[..4] != ids::EBML_HEADER.to_be_bytes() {
        return 0;
    }

    let Ok((length, width)) = vint_from_slice(&buf[4..], MAX_LENGTH_WIDTH) else {
        return 0;
    };
    if is_all_ones(length, width) {
        return 0;
    }

    let start = 4 + width;
    let Some(end) = usize::try_from(length).ok().and_then(|len| start.checked_add(len)) else {
        return 0;
    };
    let Some(header) = buf.get(start..end) else {
        return 0;
    };

    let matches = DOC_TYPES.iter().any(|doc_type| {
        header
            .windows(doc_type.len())
            .any(|window| window == doc_type.as_bytes())
    });

    if matches {
        PROBE_SCORE_MAX
    } else {
        PROBE_SCORE_EXTENSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::*;

    #[test]
    fn scores() {
        assert_eq!(probe(&ebml_header("matroska")), PROBE_SCORE_MAX);
        assert_eq!(probe(&minimal_file()), PROBE_SCORE_MAX);
        assert_eq!(probe(&ebml_header("webm")), PROBE_SCORE_MAX);
        assert_eq!(probe(&ebml_header("other")), PROBE_SCORE_EXTENSION);
    }

    #[test]
    fn rejects() {
        assert_eq!(probe(&[]), 0);
        assert_eq!(probe(&[0x1A, 0x45, 0xDF, 0xA3]), 0);
        assert_eq!(probe(b"RIFF\x24\x00\x00\x00WAVE"), 0);

        // Malformed header length.
        assert_eq!(probe(&[0x1A, 0x45, 0xDF, 0xA3, 0x00, 0x00]), 0);
        // Unknown header length.
        assert_eq!(probe(&[0x1A, 0x45, 0xDF, 0xA3, 0xFF, 0x00]), 0);

        // Header cut short.
        let header = ebml_header("matroska");
        assert_eq!(probe(&header[..header.len() - 3]), 0);
    }
}
