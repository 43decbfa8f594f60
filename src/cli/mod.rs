use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Result, bail};

use mkv::process::demux::{DemuxOptions, Demuxer};
use mkv::process::probe::probe;

use crate::input::InputReader;
use command::Cli;

pub mod command;
pub mod extract;
pub mod info;
pub mod packets;

const PROBE_SIZE: u64 = 2048;

/// Opens the input, checks it looks like Matroska and reads the header.
pub fn open_demuxer(path: &Path, cli: &Cli) -> Result<Demuxer<InputReader>> {
    let mut input = InputReader::new(path)?;

    let mut head = Vec::new();
    input.by_ref().take(PROBE_SIZE).read_to_end(&mut head)?;
    input.seek(SeekFrom::Start(0))?;

    let score = probe(&head);
    log::debug!("Probe score {score} for {}", path.display());
    if score == 0 {
        bail!("{} is not a Matroska or WebM file", path.display());
    }

    let options = DemuxOptions {
        seekable: !input.is_pipe(),
        fail_level: cli.fail_level(),
    };

    let mut demuxer = Demuxer::with_options(input, options)?;
    demuxer.read_header()?;

    Ok(demuxer)
}
