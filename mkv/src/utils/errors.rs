use std::io;

/// Returns `$err` when `$level` is at or above the configured fail level,
/// otherwise logs it at `$level` and carries on.
#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum DemuxError {
    #[error("Not an EBML document: found ID {0:#X} where the EBML header was expected")]
    NotEbml(u32),

    #[error("Expected a Segment after the EBML header, found ID {0:#X}")]
    MissingSegment(u32),

    #[error("Unsupported document type '{0}'")]
    WrongDocType(String),

    #[error("Unsupported {field} {value} (maximum supported is {max})")]
    UnsupportedVersion {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("Stream truncated at byte {0}")]
    TruncatedStream(u64),

    #[error("Invalid variable-length integer (first byte {byte:#04X}) at byte {pos}")]
    InvalidVarint { byte: u8, pos: u64 },

    #[error("Invalid size {size} for element {id:#X} at byte {pos}")]
    InvalidElementSize { id: u32, size: u64, pos: u64 },

    #[error("Element {id:#X} at byte {pos} extends past the end of its parent")]
    ElementOverflow { id: u32, pos: u64 },

    #[error("Unimplemented: {0}")]
    Unimplemented(&'static str),

    #[error("Maximum EBML nesting depth ({0}) exceeded")]
    DepthExceeded(usize),

    #[error("Unknown element {id:#X} at byte {pos}, skipped")]
    UnknownElement { id: u32, pos: u64 },

    #[error("Malformed track field: {0}")]
    MalformedTrackField(String),

    #[error("Malformed cue entry: {0}")]
    MalformedCueEntry(String),

    #[error("Malformed lace: {0}")]
    MalformedLace(String),

    #[error("Unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Corrupt frame: {0}")]
    CorruptFrame(String),

    #[error("Block at byte {pos} references unknown track {track}")]
    UnknownTrack { track: u64, pos: u64 },

    #[error("Seek target mismatch at byte {pos}: expected {expected:#X}, found {found:#X}")]
    SeekTargetMismatch { expected: u32, found: u32, pos: u64 },

    #[error("Input is not seekable")]
    NotSeekable,

    #[error("Invalid stream index {0}")]
    InvalidStreamIndex(usize),

    #[error("The header has not been read yet")]
    HeaderNotRead,

    #[error("End of stream")]
    EndOfStream,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DemuxError {
    /// Errors after which byte offsets can no longer be trusted.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::TruncatedStream(_)
                | Self::InvalidVarint { .. }
                | Self::ElementOverflow { .. }
                | Self::DepthExceeded(_)
                | Self::EndOfStream
                | Self::Io(_)
        )
    }
}

pub type Result<T, E = DemuxError> = std::result::Result<T, E>;

#[test]
fn structural_classification() {
    assert!(DemuxError::DepthExceeded(16).is_structural());
    assert!(DemuxError::TruncatedStream(10).is_structural());
    assert!(
        !DemuxError::InvalidElementSize {
            id: 0x4286,
            size: 9,
            pos: 0
        }
        .is_structural()
    );
    assert!(!DemuxError::MalformedLace(String::new()).is_structural());
}
