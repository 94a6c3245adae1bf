//! Data directories and the debug directory table.

use goblin::pe::debug::IMAGE_DEBUG_TYPE_CODEVIEW;
use strum::Display;

use crate::{file::Image, Result};

/// Size of an `IMAGE_DATA_DIRECTORY` entry.
pub const SIZEOF_DATA_DIRECTORY: usize = 8;

/// Size of `IMAGE_EXPORT_DIRECTORY`.
pub const SIZEOF_EXPORT_DIRECTORY: usize = 40;

/// Size of `IMAGE_RESOURCE_DIRECTORY`.
pub const SIZEOF_RESOURCE_DIRECTORY: usize = 16;

/// Size of `IMAGE_DEBUG_DIRECTORY`.
pub const SIZEOF_DEBUG_DIRECTORY: usize = 28;

/// Offset of `TimeDateStamp` in the export, resource and debug directories alike.
pub const TIME_DATE_STAMP_OFFSET: usize = 4;

/// The data directories that carry non-deterministic fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DataDirectoryKind {
    /// `IMAGE_DIRECTORY_ENTRY_EXPORT`
    #[strum(to_string = "export")]
    Export,
    /// `IMAGE_DIRECTORY_ENTRY_RESOURCE`
    #[strum(to_string = "resource")]
    Resource,
    /// `IMAGE_DIRECTORY_ENTRY_DEBUG`
    #[strum(to_string = "debug")]
    Debug,
}

impl DataDirectoryKind {
    /// Index of this directory in the optional header's data directory table.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            DataDirectoryKind::Export => 0,
            DataDirectoryKind::Resource => 2,
            DataDirectoryKind::Debug => 6,
        }
    }
}

/// A present (non-zero) data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDirectoryEntry {
    /// Which directory this is
    pub kind: DataDirectoryKind,
    /// RVA of the directory contents
    pub virtual_address: u32,
    /// Size of the directory contents in bytes
    pub size: u32,
}

/// One `IMAGE_DEBUG_DIRECTORY` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugDirectoryEntry {
    /// File offset of the entry
    pub offset: usize,
    /// `Characteristics`
    pub characteristics: u32,
    /// `TimeDateStamp`
    pub time_date_stamp: u32,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// `Type`
    pub debug_type: u32,
    /// `SizeOfData`
    pub size_of_data: u32,
    /// `AddressOfRawData`
    pub address_of_raw_data: u32,
    /// `PointerToRawData`, a file offset
    pub pointer_to_raw_data: u32,
}

impl DebugDirectoryEntry {
    /// Reads the entry at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the entry does not fit into the image.
    pub fn parse(image: &Image, offset: usize) -> Result<Self> {
        if !image.is_valid_range(offset, SIZEOF_DEBUG_DIRECTORY) {
            return Err(invalid_image!(
                "IMAGE_DEBUG_DIRECTORY at 0x{:x} lies outside the image",
                offset
            ));
        }

        Ok(DebugDirectoryEntry {
            offset,
            characteristics: image.read_le(offset, "IMAGE_DEBUG_DIRECTORY.Characteristics")?,
            time_date_stamp: image.read_le(offset + 4, "IMAGE_DEBUG_DIRECTORY.TimeDateStamp")?,
            major_version: image.read_le(offset + 8, "IMAGE_DEBUG_DIRECTORY.MajorVersion")?,
            minor_version: image.read_le(offset + 10, "IMAGE_DEBUG_DIRECTORY.MinorVersion")?,
            debug_type: image.read_le(offset + 12, "IMAGE_DEBUG_DIRECTORY.Type")?,
            size_of_data: image.read_le(offset + 16, "IMAGE_DEBUG_DIRECTORY.SizeOfData")?,
            address_of_raw_data: image
                .read_le(offset + 20, "IMAGE_DEBUG_DIRECTORY.AddressOfRawData")?,
            pointer_to_raw_data: image
                .read_le(offset + 24, "IMAGE_DEBUG_DIRECTORY.PointerToRawData")?,
        })
    }

    /// File offset of the `TimeDateStamp` field.
    #[must_use]
    pub fn timestamp_offset(&self) -> usize {
        self.offset + TIME_DATE_STAMP_OFFSET
    }

    /// Returns `true` for an `IMAGE_DEBUG_TYPE_CODEVIEW` entry.
    #[must_use]
    pub fn is_codeview(&self) -> bool {
        self.debug_type == IMAGE_DEBUG_TYPE_CODEVIEW
    }
}

/// Iterator over the entries of the debug directory table.
///
/// The number of entries is the directory size divided by [`SIZEOF_DEBUG_DIRECTORY`]; a
/// trailing partial entry is ignored.
#[derive(Debug, Clone)]
pub struct DebugDirectories<'a> {
    image: &'a Image,
    offset: usize,
    index: usize,
    count: usize,
}

impl<'a> DebugDirectories<'a> {
    pub(crate) fn new(image: &'a Image, offset: usize, count: usize) -> Self {
        DebugDirectories {
            image,
            offset,
            index: 0,
            count,
        }
    }

    pub(crate) fn empty(image: &'a Image) -> Self {
        DebugDirectories::new(image, 0, 0)
    }
}

impl Iterator for DebugDirectories<'_> {
    type Item = Result<DebugDirectoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }

        let offset = self.offset + self.index * SIZEOF_DEBUG_DIRECTORY;
        self.index += 1;
        Some(DebugDirectoryEntry::parse(self.image, offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DebugDirectories<'_> {}
