use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, ExtractArgs};
use super::open_demuxer;
use crate::timestamp::ms_str;

/// Builds `<base>.track<N>.<ext>`.
fn track_path(base_path: &Path, number: u64, ext: &str) -> PathBuf {
    let mut name = base_path.as_os_str().to_os_string();
    name.push(format!(".track{number}.{ext}"));
    PathBuf::from(name)
}

/// Output base: the explicit path, or the input without its extension.
fn base_path(args: &ExtractArgs) -> PathBuf {
    if let Some(path) = &args.output_path {
        return path.clone();
    }

    if args.input.to_string_lossy() == "-" {
        PathBuf::from("stdin")
    } else {
        args.input.with_extension("")
    }
}

struct TrackOutput {
    path: PathBuf,
    writer: BufWriter<File>,
    packets: u64,
    bytes: u64,
    last_ms: u64,
}

pub fn cmd_extract(args: &ExtractArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Extracting tracks from: {} (strict mode: {})",
        args.input.display(),
        cli.strict
    );

    let mut demuxer = open_demuxer(&args.input, cli)?;
    let base_path = base_path(args);

    for number in &args.tracks {
        if !demuxer.tracks().iter().any(|track| track.number == *number) {
            bail!("Track {number} not found in {}", args.input.display());
        }
    }

    let mut outputs = BTreeMap::new();
    for track in demuxer.tracks() {
        if !args.tracks.is_empty() && !args.tracks.contains(&track.number) {
            continue;
        }

        let path = track_path(&base_path, track.number, track.codec.extension());
        log::info!("Track {} ({}) -> {}", track.number, track.codec, path.display());

        let writer = BufWriter::new(File::create(&path)?);

        outputs.insert(
            track.number,
            TrackOutput {
                path,
                writer,
                packets: 0,
                bytes: 0,
                last_ms: 0,
            },
        );
    }

    let pb = if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} packets\n{msg} | elapsed: {elapsed_precise}",
        )?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    for packet in demuxer.by_ref() {
        let packet = packet?;

        if let Some(pb) = &pb {
            pb.inc(1);
            if pb.position().is_multiple_of(100) {
                pb.set_message(format!("at {}", ms_str(packet.timestamp_ms)));
            }
        }

        let Some(output) = outputs.get_mut(&packet.track_number) else {
            continue;
        };

        output.writer.write_all(&packet.data)?;
        output.packets += 1;
        output.bytes += packet.len() as u64;
        output.last_ms = output.last_ms.max(packet.timestamp_ms);
    }

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    demuxer.close();

    println!("Extraction Summary");
    for (number, mut output) in outputs {
        output.writer.flush()?;
        println!(
            "  Track {number:<4}  {:>8} packets  {:>12} bytes  last {}  {}",
            output.packets,
            output.bytes,
            ms_str(output.last_ms),
            output.path.display()
        );
    }

    Ok(())
}
