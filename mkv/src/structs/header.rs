//! EBML header.
//!
//! Every Matroska file starts with an EBML header master element naming the
//! document type and the reader versions needed to parse it.

use std::io::{Read, Seek};

use log::{debug, warn};

use crate::structs::ids;
use crate::utils::ebml_reader::EbmlReader;
use crate::utils::errors::{DemuxError, Result};
use crate::utils::vint::{MAX_ID_WIDTH, MAX_LENGTH_WIDTH};

/// Highest EBML read version understood.
pub const EBML_VERSION: u64 = 1;

/// Highest Matroska document read version understood.
pub const MATROSKA_VERSION: u64 = 3;

/// Document types sharing the Matroska layout.
pub const DOC_TYPES: [&str; 2] = ["matroska", "webm"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbmlHeader {
    pub version: u64,
    pub read_version: u64,
    pub max_id_length: u64,
    pub max_size_length: u64,
    pub doc_type: String,
    pub doc_type_version: u64,
    pub doc_type_read_version: u64,
}

impl Default for EbmlHeader {
    fn default() -> Self {
        Self {
            version: 1,
            read_version: 1,
            max_id_length: MAX_ID_WIDTH as u64,
            max_size_length: MAX_LENGTH_WIDTH as u64,
            doc_type: DOC_TYPES[0].to_string(),
            doc_type_version: 1,
            doc_type_read_version: 1,
        }
    }
}

impl EbmlHeader {
    pub fn read<R: Read + Seek>(reader: &mut EbmlReader<R>) -> Result<Self> {
        let id = match reader.peek_id() {
            Ok((id, _)) => id,
            Err(DemuxError::EndOfStream | DemuxError::TruncatedStream(_)) => {
                return Err(DemuxError::NotEbml(0));
            }
            Err(DemuxError::InvalidVarint { byte, .. }) => {
                return Err(DemuxError::NotEbml(u32::from(byte)));
            }
            Err(e) => return Err(e),
        };
        if id != ids::EBML_HEADER {
            return Err(DemuxError::NotEbml(id));
        }

        let master = reader.read_master()?;
        let mut header = Self::default();

        while let Some(id) = reader.next_child(master.depth)? {
            match id {
                ids::EBML_VERSION => header.version = reader.read_uint()?,
                ids::EBML_READ_VERSION => header.read_version = reader.read_uint()?,
                ids::EBML_MAX_ID_LENGTH => header.max_id_length = reader.read_uint()?,
                ids::EBML_MAX_SIZE_LENGTH => header.max_size_length = reader.read_uint()?,
                ids::DOC_TYPE => header.doc_type = reader.read_string()?,
                ids::DOC_TYPE_VERSION => header.doc_type_version = reader.read_uint()?,
                ids::DOC_TYPE_READ_VERSION => header.doc_type_read_version = reader.read_uint()?,
                ids::VOID | ids::CRC32 => reader.skip()?,
                _ => {
                    warn!(
                        "{}",
                        DemuxError::UnknownElement {
                            id,
                            pos: reader.element_start()
                        }
                    );
                    reader.skip()?;
                }
            }
        }

        header.validate()?;
        debug!(
            "EBML header: doc type '{}' version {} (read version {})",
            header.doc_type, header.doc_type_version, header.doc_type_read_version
        );

        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        let limits = [
            ("EBMLReadVersion", self.read_version, EBML_VERSION),
            ("EBMLMaxIDLength", self.max_id_length, MAX_ID_WIDTH as u64),
            ("EBMLMaxSizeLength", self.max_size_length, MAX_LENGTH_WIDTH as u64),
        ];
        for (field, value, max) in limits {
            if value > max {
                return Err(DemuxError::UnsupportedVersion { field, value, max });
            }
        }

        if !DOC_TYPES.contains(&self.doc_type.as_str()) {
            return Err(DemuxError::WrongDocType(self.doc_type.clone()));
        }

        if self.doc_type_read_version > MATROSKA_VERSION {
            return Err(DemuxError::UnsupportedVersion {
                field: "DocTypeReadVersion",
                value: self.doc_type_read_version,
                max: MATROSKA_VERSION,
            });
        }

        Ok(())
    }
}
