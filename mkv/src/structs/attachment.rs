//! Files attached to the segment, typically fonts and cover art.

use std::io::{Read, Seek};

use log::debug;

use crate::process::demux::DemuxState;
use crate::structs::ids;
use crate::utils::ebml_reader::EbmlReader;
use crate::utils::errors::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    pub uid: u64,
    pub name: String,
    pub mime_type: String,
    pub description: Option<String>,
    pub data: Vec<u8>,
}

pub fn read_attachments<R: Read + Seek>(
    state: &DemuxState,
    reader: &mut EbmlReader<R>,
) -> Result<Vec<Attachment>> {
    let master = reader.read_master()?;
    let mut attachments = Vec::new();

    while let Some(id) = reader.next_child(master.depth)? {
        if id != ids::ATTACHED_FILE {
            reader.skip()?;
            continue;
        }

        let file = reader.read_master()?;
        let mut attachment = Attachment::default();
        let mut has_data = false;
        while let Some(id) = reader.next_child(file.depth)? {
            match id {
                ids::FILE_UID => attachment.uid = state.field(reader.read_uint())?.unwrap_or_default(),
                ids::FILE_NAME => attachment.name = state.field(reader.read_string())?.unwrap_or_default(),
                ids::FILE_MIME_TYPE => {
                    attachment.mime_type = state.field(reader.read_string())?.unwrap_or_default()
                }
                ids::FILE_DESCRIPTION => attachment.description = state.field(reader.read_string())?,
                ids::FILE_DATA => {
                    if let Some(data) = state.field(reader.read_binary())? {
                        attachment.data = data;
                        has_data = true;
                    }
                }
                _ => reader.skip()?,
            }
        }

        if has_data && !attachment.name.is_empty() && !attachment.mime_type.is_empty() {
            attachments.push(attachment);
        } else {
            debug!("Dropping incomplete AttachedFile at byte {}", file.pos);
        }
    }

    Ok(attachments)
}
