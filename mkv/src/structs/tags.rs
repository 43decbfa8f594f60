//! Tags: free-form metadata attached to the segment, tracks, chapters or
//! attachments.

use std::io::{Read, Seek};

use crate::process::demux::DemuxState;
use crate::structs::ids;
use crate::utils::ebml_reader::EbmlReader;
use crate::utils::errors::Result;

pub const DEFAULT_TARGET_TYPE_VALUE: u64 = 50;
pub const DEFAULT_TAG_LANGUAGE: &str = "und";

#[derive(Debug, Clone, PartialEq)]
pub struct TagTargets {
    /// 70 collection down to 10 shot; 50 is a movie or album.
    pub type_value: u64,
    pub target_type: Option<String>,
    pub track_uids: Vec<u64>,
    pub chapter_uids: Vec<u64>,
    pub attachment_uids: Vec<u64>,
}

impl Default for TagTargets {
    fn default() -> Self {
        Self {
            type_value: DEFAULT_TARGET_TYPE_VALUE,
            target_type: None,
            track_uids: Vec::new(),
            chapter_uids: Vec::new(),
            attachment_uids: Vec::new(),
        }
    }
}

impl TagTargets {
    /// Targets nothing more specific than the whole segment.
    pub fn is_global(&self) -> bool {
        self.track_uids.is_empty() && self.chapter_uids.is_empty() && self.attachment_uids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleTag {
    pub name: String,
    pub language: String,
    pub default: bool,
    pub string: Option<String>,
    pub binary: Option<Vec<u8>>,
    pub children: Vec<SimpleTag>,
}

impl Default for SimpleTag {
    fn default() -> Self {
        Self {
            name: String::new(),
            language: DEFAULT_TAG_LANGUAGE.to_string(),
            default: true,
            string: None,
            binary: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub targets: TagTargets,
    pub simple_tags: Vec<SimpleTag>,
}

impl Tag {
    /// First top-level value named `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.simple_tags
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .and_then(|t| t.string.as_deref())
    }
}

pub fn read_tags<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Vec<Tag>> {
    let master = reader.read_master()?;
    let mut tags = Vec::new();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::TAG => tags.push(read_tag(state, reader)?),
            _ => reader.skip()?,
        }
    }

    Ok(tags)
}

fn read_tag<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<Tag> {
    let master = reader.read_master()?;
    let mut tag = Tag::default();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::TAG_TARGETS => tag.targets = read_targets(state, reader)?,
            ids::SIMPLE_TAG => tag.simple_tags.push(read_simple_tag(state, reader)?),
            _ => reader.skip()?,
        }
    }

    Ok(tag)
}

fn read_targets<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<TagTargets> {
    let master = reader.read_master()?;
    let mut targets = TagTargets::default();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::TAG_TARGET_TYPE_VALUE => {
                if let Some(value) = state.field(reader.read_uint())? {
                    targets.type_value = value;
                }
            }
            ids::TAG_TARGET_TYPE => targets.target_type = state.field(reader.read_string())?,
            ids::TAG_TRACK_UID => targets.track_uids.extend(state.field(reader.read_uint())?),
            ids::TAG_CHAPTER_UID => targets.chapter_uids.extend(state.field(reader.read_uint())?),
            ids::TAG_ATTACHMENT_UID => targets.attachment_uids.extend(state.field(reader.read_uint())?),
            _ => reader.skip()?,
        }
    }

    Ok(targets)
}

fn read_simple_tag<R: Read + Seek>(state: &DemuxState, reader: &mut EbmlReader<R>) -> Result<SimpleTag> {
    let master = reader.read_master()?;
    let mut tag = SimpleTag::default();

    while let Some(id) = reader.next_child(master.depth)? {
        match id {
            ids::TAG_NAME => tag.name = state.field(reader.read_string())?.unwrap_or_default(),
            ids::TAG_LANGUAGE => {
                if let Some(language) = state.field(reader.read_string())? {
                    tag.language = language;
                }
            }
            ids::TAG_DEFAULT => {
                if let Some(flag) = state.field(reader.read_uint())? {
                    tag.default = flag != 0;
                }
            }
            ids::TAG_STRING => tag.string = state.field(reader.read_string())?,
            ids::TAG_BINARY => tag.binary = state.field(reader.read_binary())?,
            // Nesting is bounded by the cursor's level stack.
            ids::SIMPLE_TAG => tag.children.push(read_simple_tag(state, reader)?),
            _ => reader.skip()?,
        }
    }

    Ok(tag)
}
