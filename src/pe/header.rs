//! PE32 and PE32+ optional header layouts.
//!
//! The two optional header variants share their leading fields but differ in the width of
//! the address fields that follow, which shifts the position of the data directory table.
//! Rather than branching on the magic everywhere, the variant is selected once while
//! parsing and captured in [`OptionalHeader`]. Everything that depends on the layout is
//! written generically over [`OptionalHeaderLayout`].

use std::marker::PhantomData;

use goblin::pe::optional_header::{MAGIC_32, MAGIC_64};
use strum::Display;

use crate::{
    file::Image,
    pe::directory::{DataDirectoryEntry, DataDirectoryKind, SIZEOF_DATA_DIRECTORY},
    Result,
};

/// Which optional header variant an image uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OptionalHeaderMagic {
    /// 32-bit image, `IMAGE_NT_OPTIONAL_HDR32_MAGIC` (0x10b)
    #[strum(to_string = "PE32")]
    Pe32,
    /// 64-bit image, `IMAGE_NT_OPTIONAL_HDR64_MAGIC` (0x20b)
    #[strum(to_string = "PE32+")]
    Pe64,
}

/// Field offsets of an optional header variant, relative to the start of the header.
pub trait OptionalHeaderLayout {
    /// Value of the `Magic` field identifying this variant
    const MAGIC: u16;
    /// The variant this layout describes
    const KIND: OptionalHeaderMagic;
    /// Offset of `SizeOfHeaders`
    const SIZE_OF_HEADERS_OFFSET: usize = 60;
    /// Offset of `CheckSum`
    const CHECKSUM_OFFSET: usize = 64;
    /// Offset of `NumberOfRvaAndSizes`
    const NUMBER_OF_RVA_AND_SIZES_OFFSET: usize;
    /// Offset of the first data directory
    const DATA_DIRECTORIES_OFFSET: usize;
}

/// `IMAGE_OPTIONAL_HEADER32`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pe32;

/// `IMAGE_OPTIONAL_HEADER64`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pe64;

impl OptionalHeaderLayout for Pe32 {
    const MAGIC: u16 = MAGIC_32;
    const KIND: OptionalHeaderMagic = OptionalHeaderMagic::Pe32;
    const NUMBER_OF_RVA_AND_SIZES_OFFSET: usize = 92;
    const DATA_DIRECTORIES_OFFSET: usize = 96;
}

impl OptionalHeaderLayout for Pe64 {
    const MAGIC: u16 = MAGIC_64;
    const KIND: OptionalHeaderMagic = OptionalHeaderMagic::Pe64;
    const NUMBER_OF_RVA_AND_SIZES_OFFSET: usize = 108;
    const DATA_DIRECTORIES_OFFSET: usize = 112;
}

/// A bounds-checked view of an optional header with layout `L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalHeaderView<L: OptionalHeaderLayout> {
    offset: usize,
    size: usize,
    size_of_headers: u32,
    directory_count: usize,
    _layout: PhantomData<L>,
}

impl<L: OptionalHeaderLayout> OptionalHeaderView<L> {
    /// Parses the optional header at `offset`, declared as `size` bytes long by the COFF
    /// header.
    ///
    /// The number of usable data directories is the smaller of `NumberOfRvaAndSizes` and
    /// what fits into the declared header size.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the header is too small for its variant or
    /// extends past the end of the image.
    pub fn parse(image: &Image, offset: usize, size: usize) -> Result<Self> {
        if size < L::DATA_DIRECTORIES_OFFSET {
            return Err(invalid_image!(
                "SizeOfOptionalHeader {} is too small for a {} optional header",
                size,
                L::KIND
            ));
        }
        if !image.is_valid_range(offset, size) {
            return Err(invalid_image!(
                "optional header at 0x{:x} ({} bytes) lies outside the image",
                offset,
                size
            ));
        }

        let magic: u16 = image.read_le(offset, "OptionalHeader.Magic")?;
        if magic != L::MAGIC {
            return Err(invalid_image!(
                "optional header magic 0x{:04x} does not describe a {} header",
                magic,
                L::KIND
            ));
        }

        let size_of_headers: u32 =
            image.read_le(offset + L::SIZE_OF_HEADERS_OFFSET, "SizeOfHeaders")?;
        let declared: u32 = image.read_le(
            offset + L::NUMBER_OF_RVA_AND_SIZES_OFFSET,
            "NumberOfRvaAndSizes",
        )?;
        let available = (size - L::DATA_DIRECTORIES_OFFSET) / SIZEOF_DATA_DIRECTORY;

        Ok(OptionalHeaderView {
            offset,
            size,
            size_of_headers,
            directory_count: (declared as usize).min(available),
            _layout: PhantomData,
        })
    }

    /// File offset of the optional header.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Declared size of the optional header.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// File offset of the `CheckSum` field.
    #[must_use]
    pub fn checksum_offset(&self) -> usize {
        self.offset + L::CHECKSUM_OFFSET
    }

    /// Value of `SizeOfHeaders`.
    #[must_use]
    pub fn size_of_headers(&self) -> u32 {
        self.size_of_headers
    }

    /// Number of data directories present in the header.
    #[must_use]
    pub fn directory_count(&self) -> usize {
        self.directory_count
    }

    /// Looks up a data directory.
    ///
    /// Returns `None` if the directory index is beyond the header's directory table or the
    /// directory has a zero address or size.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the directory entry cannot be read.
    pub fn data_directory(
        &self,
        image: &Image,
        kind: DataDirectoryKind,
    ) -> Result<Option<DataDirectoryEntry>> {
        let index = kind.index();
        if index >= self.directory_count {
            return Ok(None);
        }

        let entry_offset =
            self.offset + L::DATA_DIRECTORIES_OFFSET + index * SIZEOF_DATA_DIRECTORY;
        let virtual_address: u32 = image.read_le(entry_offset, "IMAGE_DATA_DIRECTORY")?;
        let size: u32 = image.read_le(entry_offset + 4, "IMAGE_DATA_DIRECTORY")?;

        if virtual_address == 0 || size == 0 {
            return Ok(None);
        }

        Ok(Some(DataDirectoryEntry {
            kind,
            virtual_address,
            size,
        }))
    }
}

/// The optional header of an image, tagged by variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalHeader {
    /// A PE32 optional header
    Pe32(OptionalHeaderView<Pe32>),
    /// A PE32+ optional header
    Pe64(OptionalHeaderView<Pe64>),
}

impl OptionalHeader {
    /// Reads the `Magic` field at `offset` and parses the matching variant.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the magic is neither PE32 nor PE32+, or the
    /// header does not fit.
    pub fn parse(image: &Image, offset: usize, size: usize) -> Result<Self> {
        let magic: u16 = image.read_le(offset, "OptionalHeader.Magic")?;
        match magic {
            MAGIC_32 => Ok(OptionalHeader::Pe32(OptionalHeaderView::parse(
                image, offset, size,
            )?)),
            MAGIC_64 => Ok(OptionalHeader::Pe64(OptionalHeaderView::parse(
                image, offset, size,
            )?)),
            _ => Err(invalid_image!(
                "unsupported IMAGE_NT_HEADERS.OptionalHeader magic 0x{:04x}",
                magic
            )),
        }
    }

    /// The variant of this header.
    #[must_use]
    pub fn magic(&self) -> OptionalHeaderMagic {
        match self {
            OptionalHeader::Pe32(_) => Pe32::KIND,
            OptionalHeader::Pe64(_) => Pe64::KIND,
        }
    }

    /// File offset of the `CheckSum` field.
    #[must_use]
    pub fn checksum_offset(&self) -> usize {
        match self {
            OptionalHeader::Pe32(view) => view.checksum_offset(),
            OptionalHeader::Pe64(view) => view.checksum_offset(),
        }
    }

    /// Value of `SizeOfHeaders`.
    #[must_use]
    pub fn size_of_headers(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(view) => view.size_of_headers(),
            OptionalHeader::Pe64(view) => view.size_of_headers(),
        }
    }

    /// Looks up a data directory, see [`OptionalHeaderView::data_directory`].
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the directory entry cannot be read.
    pub fn data_directory(
        &self,
        image: &Image,
        kind: DataDirectoryKind,
    ) -> Result<Option<DataDirectoryEntry>> {
        match self {
            OptionalHeader::Pe32(view) => view.data_directory(image, kind),
            OptionalHeader::Pe64(view) => view.data_directory(image, kind),
        }
    }
}
