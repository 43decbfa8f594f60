use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::Result;

/// Unified input that handles both files and pipes.
///
/// Pipes cannot seek, so stdin is buffered in memory and reported through
/// [`is_pipe`](Self::is_pipe) so the demuxer can be opened non-seekable.
pub enum InputReader {
    File(BufReader<File>),
    Pipe(Cursor<Vec<u8>>),
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        if input_path.as_ref().to_string_lossy() == "-" {
            let mut data = Vec::new();
            io::stdin().lock().read_to_end(&mut data)?;
            log::debug!("Buffered {} bytes from stdin", data.len());
            Ok(Self::Pipe(Cursor::new(data)))
        } else {
            let file = File::open(input_path)?;
            Ok(Self::File(BufReader::new(file)))
        }
    }

    /// Check if this is pipe input
    pub fn is_pipe(&self) -> bool {
        matches!(self, Self::Pipe(_))
    }
}

impl Read for InputReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(file) => file.read(buf),
            Self::Pipe(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for InputReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(file) => file.seek(pos),
            Self::Pipe(cursor) => cursor.seek(pos),
        }
    }
}
