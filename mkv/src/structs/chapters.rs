//! Chapters: editions of timed, optionally nested chapter atoms.

use std::io::{Read, Seek};

use crate::process::demux::DemuxState;
use crate::structs::ids;
use crate::utils::ebml_reader::EbmlReader;
use crate::utils::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDisplay {
    pub string: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub uid: u64,
    /// Nanoseconds, unscaled.
    pub start: u64,
    pub end: Option<u64>,
    pub hidden: bool,
    pub enabled: bool,
    pub displays: Vec<ChapterDisplay>,
    pub children: Vec<Chapter>,
}

impl Default for Chapter {
    fn default() -> Self {
        Self {
            uid: 0,
            start: 0,
            end: None,
            hidden: false,
            enabled: true,
            displays: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl Chapter {
    pub fn title(&self) -> Option<&str> {
        self.displays.first().map(|d| d.string.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edition {
    pub uid: u64,
    pub hidden: bool,
    pub default: bool,
    pub ordered: bool,
    pub chapters: Vec<Chapter>,
}

pub fn read_chapters<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Vec<Edition>> {
    let master = reader.read_master()?;
    let mut editions = Vec::new();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::EDITION_ENTRY => editions.push(read_edition(state, reader)?),
            _ => reader.skip()?,
        }
    }

    Ok(editions)
}

fn read_flag<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>, current: bool) -> Result<bool> {
    Ok(state.field(reader.read_uint())?.map_or(current, |v| v != 0))
}

fn read_edition<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Edition> {
    let master = reader.read_master()?;
    let mut edition = Edition::default();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::EDITION_UID => edition.uid = state.field(reader.read_uint())?.unwrap_or_default(),
            ids::EDITION_FLAG_HIDDEN => edition.hidden = read_flag(state, reader, edition.hidden)?,
            ids::EDITION_FLAG_DEFAULT => edition.default = read_flag(state, reader, edition.default)?,
            ids::EDITION_FLAG_ORDERED => edition.ordered = read_flag(state, reader, edition.ordered)?,
            ids::CHAPTER_ATOM => edition.chapters.push(read_atom(state, reader)?),
            _ => reader.skip()?,
        }
    }

    Ok(edition)
}

fn read_atom<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Chapter> {
    let master = reader.read_master()?;
    let mut chapter = Chapter::default();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::CHAPTER_UID => chapter.uid = state.field(reader.read_uint())?.unwrap_or_default(),
            ids::CHAPTER_TIME_START => {
                chapter.start = state.field(reader.read_uint())?.unwrap_or_default()
            }
            ids::CHAPTER_TIME_END => chapter.end = state.field(reader.read_uint())?,
            ids::CHAPTER_FLAG_HIDDEN => chapter.hidden = read_flag(state, reader, chapter.hidden)?,
            ids::CHAPTER_FLAG_ENABLED => chapter.enabled = read_flag(state, reader, chapter.enabled)?,
            ids::CHAPTER_DISPLAY => chapter.displays.extend(read_display(state, reader)?),
            ids::CHAPTER_ATOM => chapter.children.push(read_atom(state, reader)?),
            _ => reader.skip()?,
        }
    }

    Ok(chapter)
}

fn read_display<R: Read + Seek>(
    state: &DemuxState,
    reader: &mut EbmlReader<R>,
) -> Result<Option<ChapterDisplay>> {
    let master = reader.read_master()?;
    let mut string = None;
    let mut language = None;

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::CHAP_STRING => string = state.field(reader.read_string())?,
            ids::CHAP_LANGUAGE => language = state.field(reader.read_string())?,
            _ => reader.skip()?,
        }
    }

    Ok(string.map(|string| ChapterDisplay {
        string,
        language: language.unwrap_or_else(|| "eng".to_string()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::*;
    use std::io::Cursor;

    fn atom(uid: u64, start: u64, title: &str, children: &[Vec<u8>]) -> Vec<u8> {
        let mut all = vec![
            uint(ids::CHAPTER_UID, uid),
            uint(ids::CHAPTER_TIME_START, start),
            master(ids::CHAPTER_DISPLAY, &[string(ids::CHAP_STRING, title)]),
        ];
        all.extend_from_slice(children);
        master(ids::CHAPTER_ATOM, &all)
    }

    #[test]
    fn editions_and_atoms() -> anyhow::Result<()> {
        let data = master(
            ids::CHAPTERS,
            &[master(
                ids::EDITION_ENTRY,
                &[
                    uint(ids::EDITION_UID, 9),
                    uint(ids::EDITION_FLAG_DEFAULT, 1),
                    atom(1, 0, "Intro", &[]),
                    atom(
                        2,
                        60_000_000_000,
                        "Main",
                        &[atom(3, 90_000_000_000, "Part", &[uint(ids::CHAPTER_FLAG_HIDDEN, 1)])],
                    ),
                ],
            )],
        );
        let mut reader = EbmlReader::new(Cursor::new(data))?;
        let editions = read_chapters(&DemuxState::default(), &mut reader)?;

        assert_eq!(editions.len(), 1);
        let edition = &editions[0];
        assert_eq!(edition.uid, 9);
        assert!(edition.default && !edition.ordered);
        assert_eq!(edition.chapters.len(), 2);
        assert_eq!(edition.chapters[0].title(), Some("Intro"));
        assert_eq!(edition.chapters[0].displays[0].language, "eng");
        assert_eq!(edition.chapters[1].start, 60_000_000_000);

        let part = &edition.chapters[1].children[0];
        assert_eq!(part.title(), Some("Part"));
        assert!(part.hidden && part.enabled);
        Ok(())
    }
}
