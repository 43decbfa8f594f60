use anyhow::Result;
use indicatif::MultiProgress;

use super::command::{Cli, InfoArgs, ReportFormat};
use super::open_demuxer;
use crate::report::{ChapterReport, Report, TagValueReport};

pub fn cmd_info(args: &InfoArgs, cli: &Cli, _multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing Matroska file: {}", args.input.display());

    let demuxer = open_demuxer(&args.input, cli)?;
    let report = Report::new(&demuxer, args.index);
    demuxer.close();

    match args.format {
        ReportFormat::Plain => display_report(&report),
        ReportFormat::Yaml => print!("{}", serde_yaml_ng::to_string(&report)?),
    }

    Ok(())
}

fn display_report(report: &Report) {
    println!();
    println!("Matroska Container Information");
    println!("==============================");
    println!();

    display_segment(report);
    display_tracks(report);
    display_chapters(report);
    display_tags(report);
    display_attachments(report);
    display_index(report);
}

fn display_segment(report: &Report) {
    let segment = &report.segment;

    println!("Segment Information");
    println!(
        "  Document type             {} v{}",
        report.doc_type, report.doc_type_version
    );
    println!("  Segment offset            {}", segment.start);
    println!("  Timecode scale            {} ns", segment.timecode_scale);

    if let Some(duration) = &segment.duration {
        println!("  Duration                  {duration}");
    }
    if let Some(title) = &segment.title {
        println!("  Title                     {title}");
    }
    if let Some(app) = &segment.muxing_app {
        println!("  Muxing application        {app}");
    }
    if let Some(app) = &segment.writing_app {
        println!("  Writing application       {app}");
    }
    if let Some(date) = segment.date_unix {
        println!("  Date (Unix)               {date}");
    }
    println!();
}

fn display_tracks(report: &Report) {
    println!("Track Information");

    for track in &report.tracks {
        println!(
            "  Track {} (stream {})",
            track.number, track.stream
        );
        println!("    Type                    {}", track.track_type);
        println!("    Codec                   {} ({})", track.codec, track.codec_id);
        println!("    Language                {}", track.language);

        if let Some(name) = &track.name {
            println!("    Name                    {name}");
        }

        println!(
            "    Flags                   default: {}, forced: {}, enabled: {}",
            track.default, track.forced, track.enabled
        );

        if let Some(duration) = track.default_duration_ns {
            println!("    Default duration        {duration} ns");
        }
        if let Some(size) = track.codec_private_size {
            println!("    Codec private           {size} bytes");
        }

        if let Some(video) = &track.video {
            println!("    Resolution              {}x{}", video.width, video.height);
            if (video.display_width, video.display_height) != (video.width, video.height) {
                println!(
                    "    Display size            {}x{}",
                    video.display_width, video.display_height
                );
            }
            println!("    Interlaced              {}", video.interlaced);
            if let Some(rate) = video.frame_rate {
                println!("    Frame rate              {rate:.3} fps");
            }
        }

        if let Some(audio) = &track.audio {
            println!("    Channels                {}", audio.channels);
            println!("    Sampling rate           {} Hz", audio.sampling_frequency);
            if let Some(depth) = audio.bit_depth {
                println!("    Bit depth               {depth}");
            }
        }
    }
    println!();
}

fn display_chapters(report: &Report) {
    if report.editions.is_empty() {
        return;
    }

    println!("Chapters");
    for edition in &report.editions {
        println!(
            "  Edition {:016X}{}{}",
            edition.uid,
            if edition.default { " (default)" } else { "" },
            if edition.ordered { " (ordered)" } else { "" }
        );
        for chapter in &edition.chapters {
            display_chapter(chapter, 2);
        }
    }
    println!();
}

fn display_chapter(chapter: &ChapterReport, depth: usize) {
    let indent = "  ".repeat(depth);
    let end = chapter.end.as_deref().unwrap_or("?");
    let title = chapter.title.as_deref().unwrap_or("");

    println!("{indent}{} - {end}  {title}", chapter.start);

    for child in &chapter.children {
        display_chapter(child, depth + 1);
    }
}

fn display_tags(report: &Report) {
    if report.tags.is_empty() {
        return;
    }

    println!("Tags");
    for tag in &report.tags {
        if tag.track_uids.is_empty() {
            println!("  Target level {}", tag.target_type_value);
        } else {
            println!(
                "  Target level {} (tracks {:?})",
                tag.target_type_value, tag.track_uids
            );
        }
        for value in &tag.values {
            display_tag_value(value, 2);
        }
    }
    println!();
}

fn display_tag_value(value: &TagValueReport, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{indent}{:24}{}", value.name, value.value);

    for child in &value.children {
        display_tag_value(child, depth + 1);
    }
}

fn display_attachments(report: &Report) {
    if report.attachments.is_empty() {
        return;
    }

    println!("Attachments");
    for attachment in &report.attachments {
        println!(
            "  {:26}{} ({} bytes)",
            attachment.name, attachment.mime_type, attachment.size
        );
    }
    println!();
}

fn display_index(report: &Report) {
    let Some(index) = &report.index else {
        return;
    };

    println!("Index ({} entries)", index.len());
    for entry in index {
        println!("  Track {:<4} {}  @ {}", entry.track, entry.time, entry.pos);
    }
    println!();
}
