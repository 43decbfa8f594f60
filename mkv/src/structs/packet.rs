/// One lace of a Block, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Index into the demuxer's track table.
    pub stream_index: usize,
    pub track_number: u64,
    /// Milliseconds.
    pub timestamp_ms: u64,
    pub duration_ms: Option<u64>,
    pub keyframe: bool,
    /// The frame is decoded but not shown.
    pub invisible: bool,
    /// The frame may be dropped under load.
    pub discardable: bool,
    /// Byte offset of the element the packet came from.
    pub pos: u64,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
