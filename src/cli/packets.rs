use anyhow::Result;
use indicatif::MultiProgress;

use mkv::structs::packet::Packet;

use super::command::{Cli, PacketsArgs};
use super::open_demuxer;
use crate::timestamp::ms_str;

pub fn cmd_packets(args: &PacketsArgs, cli: &Cli, _multi: Option<&MultiProgress>) -> Result<()> {
    let demuxer = open_demuxer(&args.input, cli)?;
    let limit = args.limit.unwrap_or(usize::MAX);

    println!("stream  track  timestamp       duration      size  flags  pos");

    let mut count = 0usize;
    for packet in demuxer.take(limit) {
        let packet = packet?;

        let duration = packet
            .duration_ms
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:>6}  {:>5}  {}  {:>8}  {:>8}  {:>5}  {}",
            packet.stream_index,
            packet.track_number,
            ms_str(packet.timestamp_ms),
            duration,
            packet.len(),
            flags(&packet),
            packet.pos
        );
        count += 1;
    }

    log::info!("Listed {count} packets");

    Ok(())
}

/// `K` keyframe, `I` invisible, `D` discardable.
fn flags(packet: &Packet) -> String {
    [
        (packet.keyframe, 'K'),
        (packet.invisible, 'I'),
        (packet.discardable, 'D'),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|(_, c)| *c)
    .collect()
}
