//! The CodeView record that pairs an image with its PDB.
//!
//! A CodeView debug directory entry points at a `CV_INFO_PDB70` record:
//!
//! ```text
//! offset  size  field
//! 0       4     CvSignature ("RSDS")
//! 4       16    Signature (GUID)
//! 20      4     Age
//! 24      n     PdbFileName (NUL terminated)
//! ```
//!
//! The debugger only loads a PDB whose header stream carries the same GUID and age.

use goblin::pe::debug::CODEVIEW_PDB70_MAGIC;
use uguid::Guid;

use crate::{file::Image, pdb::PdbHeaderStream, Result};

/// A PDB 7.0 CodeView record embedded in an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdbMatchRecord {
    offset: usize,
    guid: Guid,
    age: u32,
}

impl PdbMatchRecord {
    /// Size of the fixed part of `CV_INFO_PDB70`.
    pub const SIZE: usize = 24;

    const SIGNATURE_OFFSET: usize = 4;
    const AGE_OFFSET: usize = 20;

    /// Creates a record located at `offset`.
    #[must_use]
    pub fn new(offset: usize, guid: Guid, age: u32) -> Self {
        PdbMatchRecord { offset, guid, age }
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the record does not fit into the image or
    /// is not a PDB 7.0 (`RSDS`) record.
    pub fn parse(image: &Image, offset: usize) -> Result<Self> {
        if !image.is_valid_range(offset, Self::SIZE) {
            return Err(invalid_image!("invalid CodeView debug entry location"));
        }

        let cv_signature: u32 = image.read_le(offset, "CV_INFO_PDB70.CvSignature")?;
        if cv_signature != CODEVIEW_PDB70_MAGIC {
            return Err(invalid_image!(
                "unsupported PDB format, only version 7.0 is supported"
            ));
        }

        let mut guid = [0u8; 16];
        guid.copy_from_slice(image.data_slice(offset + Self::SIGNATURE_OFFSET, 16)?);

        Ok(PdbMatchRecord {
            offset,
            guid: Guid::from_bytes(guid),
            age: image.read_le(offset + Self::AGE_OFFSET, "CV_INFO_PDB70.Age")?,
        })
    }

    /// File offset of the record.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The PDB signature GUID.
    #[must_use]
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// The PDB age.
    #[must_use]
    pub fn age(&self) -> u32 {
        self.age
    }

    /// File offset of the GUID field.
    #[must_use]
    pub fn signature_offset(&self) -> usize {
        self.offset + Self::SIGNATURE_OFFSET
    }

    /// File offset of the age field.
    #[must_use]
    pub fn age_offset(&self) -> usize {
        self.offset + Self::AGE_OFFSET
    }

    /// Returns `true` if `header` belongs to this image: the ages are equal and the GUIDs
    /// are byte-for-byte identical.
    #[must_use]
    pub fn matches(&self, header: &PdbHeaderStream) -> bool {
        self.age == header.age && self.guid.to_bytes() == header.guid.to_bytes()
    }
}
