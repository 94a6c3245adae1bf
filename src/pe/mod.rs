//! PE/COFF header parsing, restricted to what is needed to find non-deterministic fields.
//!
//! This module walks the header chain of a PE image:
//!
//! ```text
//! IMAGE_DOS_HEADER  e_magic "MZ", e_lfanew -> PE signature
//! "PE\0\0"
//! IMAGE_FILE_HEADER TimeDateStamp, NumberOfSections, SizeOfOptionalHeader
//! OptionalHeader    PE32 or PE32+, CheckSum, data directories
//! section table     used to translate directory RVAs into file offsets
//! ```
//!
//! and from there into the export, resource and debug directories. All lookups are
//! read-only and bounds-checked; any structure pointing outside the image is reported as
//! [`crate::Error::InvalidImage`].
//!
//! # Key Components
//!
//! - [`PeFile`] - The parsed header chain of an [`crate::file::Image`]
//! - [`OptionalHeader`] - PE32 / PE32+ sum type, see [`header`]
//! - [`DataDirectoryKind`], [`DebugDirectoryEntry`] - Directory access, see [`directory`]
//! - [`PdbMatchRecord`] - The CodeView record pairing the image with its PDB
//! - [`collect::collect_patches`] - Registers every non-deterministic field as a patch
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pezap::file::{Image, MapMode};
//! use pezap::pe::PeFile;
//! use std::path::Path;
//!
//! let image = Image::open(Path::new("app.dll"), MapMode::CopyOnWrite)?;
//! let pe = PeFile::parse(&image)?;
//! println!("{} image", pe.magic());
//!
//! if let Some(record) = pe.pdb_match_record()? {
//!     println!("PDB {} age {}", record.guid(), record.age());
//! }
//! # Ok::<(), pezap::Error>(())
//! ```

pub mod codeview;
pub mod collect;
pub mod directory;
pub mod header;

use goblin::pe::{
    header::{DOS_MAGIC, PE_MAGIC, PE_POINTER_OFFSET, SIZEOF_COFF_HEADER},
    section_table::{SectionTable, SIZEOF_SECTION_TABLE},
};

use crate::{file::Image, Result};

pub use codeview::PdbMatchRecord;
pub use directory::{DataDirectoryEntry, DataDirectoryKind, DebugDirectories, DebugDirectoryEntry};
pub use header::{
    OptionalHeader, OptionalHeaderLayout, OptionalHeaderMagic, OptionalHeaderView, Pe32, Pe64,
};

/// Offset of `TimeDateStamp` within `IMAGE_FILE_HEADER`.
const FILE_HEADER_TIMESTAMP_OFFSET: usize = 4;

/// The parsed header chain of an image.
///
/// Borrows the image immutably; parsing never modifies it.
#[derive(Debug)]
pub struct PeFile<'a> {
    image: &'a Image,
    file_header_offset: usize,
    optional_header: OptionalHeader,
    sections: Vec<SectionTable>,
}

impl<'a> PeFile<'a> {
    /// Parses the DOS header, PE signature, COFF header, optional header and section table.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if a magic value is wrong, the optional header
    /// is neither PE32 nor PE32+, or any header lies outside of the image.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pezap::{file::Image, pe::PeFile, Error};
    ///
    /// let image = Image::from_mem(b"not a PE file".to_vec())?;
    /// assert!(matches!(PeFile::parse(&image), Err(Error::InvalidImage { .. })));
    /// # Ok::<(), pezap::Error>(())
    /// ```
    pub fn parse(image: &'a Image) -> Result<Self> {
        let dos_magic: u16 = image.read_le(0, "IMAGE_DOS_HEADER.e_magic")?;
        if dos_magic != DOS_MAGIC {
            return Err(invalid_image!("invalid DOS signature 0x{:04x}", dos_magic));
        }

        let pe_offset: u32 =
            image.read_le(PE_POINTER_OFFSET as usize, "IMAGE_DOS_HEADER.e_lfanew")?;
        let pe_offset = pe_offset as usize;

        let signature: u32 = image.read_le(pe_offset, "IMAGE_NT_HEADERS.Signature")?;
        if signature != PE_MAGIC {
            return Err(invalid_image!("invalid PE signature 0x{:08x}", signature));
        }

        let file_header_offset = pe_offset + 4;
        if !image.is_valid_range(file_header_offset, SIZEOF_COFF_HEADER) {
            return Err(invalid_image!(
                "IMAGE_FILE_HEADER at 0x{:x} lies outside the image",
                file_header_offset
            ));
        }

        let number_of_sections: u16 = image.read_le(
            file_header_offset + 2,
            "IMAGE_FILE_HEADER.NumberOfSections",
        )?;
        let size_of_optional_header: u16 = image.read_le(
            file_header_offset + 16,
            "IMAGE_FILE_HEADER.SizeOfOptionalHeader",
        )?;

        let optional_offset = file_header_offset + SIZEOF_COFF_HEADER;
        let optional_header =
            OptionalHeader::parse(image, optional_offset, size_of_optional_header as usize)?;

        let sections = Self::parse_sections(
            image,
            optional_offset + size_of_optional_header as usize,
            number_of_sections as usize,
        )?;

        Ok(PeFile {
            image,
            file_header_offset,
            optional_header,
            sections,
        })
    }

    fn parse_sections(image: &Image, offset: usize, count: usize) -> Result<Vec<SectionTable>> {
        if !image.is_valid_range(offset, count * SIZEOF_SECTION_TABLE) {
            return Err(invalid_image!(
                "section table at 0x{:x} ({} entries) lies outside the image",
                offset,
                count
            ));
        }

        let mut cursor = offset;
        (0..count)
            .map(|_| {
                SectionTable::parse(image.data(), &mut cursor, 0)
                    .map_err(|error| invalid_image!("malformed section header - {}", error))
            })
            .collect()
    }

    /// The image the headers were parsed from.
    #[must_use]
    pub fn image(&self) -> &'a Image {
        self.image
    }

    /// The optional header variant.
    #[must_use]
    pub fn magic(&self) -> OptionalHeaderMagic {
        self.optional_header.magic()
    }

    /// The optional header.
    #[must_use]
    pub fn optional_header(&self) -> &OptionalHeader {
        &self.optional_header
    }

    /// File offset of `IMAGE_FILE_HEADER`.
    #[must_use]
    pub fn file_header_offset(&self) -> usize {
        self.file_header_offset
    }

    /// File offset of `IMAGE_FILE_HEADER.TimeDateStamp`.
    #[must_use]
    pub fn timestamp_offset(&self) -> usize {
        self.file_header_offset + FILE_HEADER_TIMESTAMP_OFFSET
    }

    /// The section headers.
    #[must_use]
    pub fn sections(&self) -> &[SectionTable] {
        &self.sections
    }

    /// Looks up a data directory; `None` if it is absent.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the directory entry cannot be read.
    pub fn data_directory(&self, kind: DataDirectoryKind) -> Result<Option<DataDirectoryEntry>> {
        self.optional_header.data_directory(self.image, kind)
    }

    /// Translates a relative virtual address into a file offset.
    ///
    /// Addresses inside a section are mapped through its raw data; addresses below
    /// `SizeOfHeaders` that no section covers map to themselves.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if no section maps the address to file data.
    pub fn rva_to_offset(&self, rva: u32) -> Result<usize> {
        for section in &self.sections {
            let span = if section.virtual_size == 0 {
                section.size_of_raw_data
            } else {
                section.virtual_size
            };

            let Some(delta) = rva.checked_sub(section.virtual_address) else {
                continue;
            };
            if delta >= span {
                continue;
            }
            if delta >= section.size_of_raw_data {
                return Err(invalid_image!(
                    "RVA 0x{:x} lies in uninitialized data of a section",
                    rva
                ));
            }

            return Ok(section.pointer_to_raw_data as usize + delta as usize);
        }

        if rva < self.optional_header.size_of_headers() {
            return Ok(rva as usize);
        }

        Err(invalid_image!("RVA 0x{:x} is not mapped by any section", rva))
    }

    /// File offset of a data directory's contents, verified to hold at least `min_len`
    /// bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the directory cannot be mapped into the image.
    pub fn directory_offset(&self, entry: &DataDirectoryEntry, min_len: usize) -> Result<usize> {
        let offset = self.rva_to_offset(entry.virtual_address)?;
        if !self.image.is_valid_range(offset, min_len) {
            return Err(invalid_image!(
                "{} directory at 0x{:x} lies outside the image",
                entry.kind,
                offset
            ));
        }

        Ok(offset)
    }

    /// The entries of the debug directory table; empty if the image has none.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the table does not fit into the image.
    pub fn debug_directories(&self) -> Result<DebugDirectories<'a>> {
        let Some(entry) = self.data_directory(DataDirectoryKind::Debug)? else {
            return Ok(DebugDirectories::empty(self.image));
        };

        let count = entry.size as usize / directory::SIZEOF_DEBUG_DIRECTORY;
        let offset =
            self.directory_offset(&entry, count * directory::SIZEOF_DEBUG_DIRECTORY)?;

        Ok(DebugDirectories::new(self.image, offset, count))
    }

    /// The CodeView record pairing this image with its PDB, if there is one.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if there is more than one CodeView entry, the
    /// record lies outside the image, or it is not a PDB 7.0 record.
    pub fn pdb_match_record(&self) -> Result<Option<PdbMatchRecord>> {
        let mut location = None;

        for entry in self.debug_directories()? {
            let entry = entry?;
            if !entry.is_codeview() {
                continue;
            }

            if location.is_some() {
                return Err(invalid_image!("found multiple CodeView debug entries"));
            }

            let offset = entry.pointer_to_raw_data as usize;
            if !self.image.is_valid_range(offset, PdbMatchRecord::SIZE) {
                return Err(invalid_image!("invalid CodeView debug entry location"));
            }
            location = Some(offset);
        }

        location
            .map(|offset| PdbMatchRecord::parse(self.image, offset))
            .transpose()
    }
}
