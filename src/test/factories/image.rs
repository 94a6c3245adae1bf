//! Synthetic PE images.
//!
//! ```text
//! 0x000  IMAGE_DOS_HEADER, e_lfanew = 0x80
//! 0x080  "PE\0\0"
//! 0x084  IMAGE_FILE_HEADER
//! 0x098  optional header (PE32: 224 bytes, PE32+: 240 bytes)
//! ...    one section header
//! 0x200  .rdata, RVA 0x1000
//!        +0x00 export directory
//!        +0x30 resource directory
//!        +0x40 debug directory (up to two entries)
//!        +0x80 CodeView record
//!        +0x100 filler
//! 0x400  end of file
//! ```

use goblin::pe::{
    debug::IMAGE_DEBUG_TYPE_CODEVIEW,
    optional_header::{MAGIC_32, MAGIC_64},
};

pub const PE_OFFSET: usize = 0x80;
pub const FILE_HEADER_OFFSET: usize = PE_OFFSET + 4;
pub const OPTIONAL_HEADER_OFFSET: usize = FILE_HEADER_OFFSET + 20;
pub const SIZE_OF_HEADERS: u32 = 0x200;
pub const SECTION_RVA: u32 = 0x1000;
pub const SECTION_RAW_OFFSET: usize = 0x200;
pub const SECTION_SIZE: usize = 0x200;
pub const EXPORT_OFFSET: usize = SECTION_RAW_OFFSET;
pub const RESOURCE_OFFSET: usize = SECTION_RAW_OFFSET + 0x30;
pub const DEBUG_OFFSET: usize = SECTION_RAW_OFFSET + 0x40;
pub const CODEVIEW_OFFSET: usize = SECTION_RAW_OFFSET + 0x80;
pub const IMAGE_SIZE: usize = SECTION_RAW_OFFSET + SECTION_SIZE;

pub const DEFAULT_TIMESTAMP: u32 = 0x6512_3456;
pub const DEFAULT_CHECKSUM: u32 = 0x0001_F00D;

fn rva(offset: usize) -> u32 {
    SECTION_RVA + (offset - SECTION_RAW_OFFSET) as u32
}

fn put_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug, Clone)]
pub struct ImageBuilder {
    magic: u16,
    timestamp: u32,
    debug_timestamp: Option<u32>,
    debug: bool,
    export: bool,
    resource: bool,
    codeview_guid: [u8; 16],
    codeview_age: u32,
    codeview_pointer: Option<u32>,
    extra_debug_type: Option<u32>,
    filler: u8,
}

impl ImageBuilder {
    fn new(magic: u16) -> Self {
        ImageBuilder {
            magic,
            timestamp: DEFAULT_TIMESTAMP,
            debug_timestamp: None,
            debug: true,
            export: false,
            resource: false,
            codeview_guid: [0x11; 16],
            codeview_age: 1,
            codeview_pointer: None,
            extra_debug_type: None,
            filler: 0xC3,
        }
    }

    pub fn pe32() -> Self {
        ImageBuilder::new(MAGIC_32)
    }

    pub fn pe64() -> Self {
        ImageBuilder::new(MAGIC_64)
    }

    /// Writes `magic` into the optional header while keeping the PE32/PE32+ layout.
    pub fn optional_magic(mut self, magic: u16) -> Self {
        self.magic = magic;
        self
    }

    pub fn timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn debug_timestamp(mut self, timestamp: u32) -> Self {
        self.debug_timestamp = Some(timestamp);
        self
    }

    pub fn without_debug(mut self) -> Self {
        self.debug = false;
        self
    }

    pub fn export_directory(mut self) -> Self {
        self.export = true;
        self
    }

    pub fn resource_directory(mut self) -> Self {
        self.resource = true;
        self
    }

    pub fn codeview(mut self, guid: [u8; 16], age: u32) -> Self {
        self.debug = true;
        self.codeview_guid = guid;
        self.codeview_age = age;
        self
    }

    pub fn codeview_pointer(mut self, pointer: u32) -> Self {
        self.codeview_pointer = Some(pointer);
        self
    }

    pub fn extra_debug_entry(mut self, debug_type: u32) -> Self {
        self.extra_debug_type = Some(debug_type);
        self
    }

    pub fn filler(mut self, filler: u8) -> Self {
        self.filler = filler;
        self
    }

    fn is_pe64(&self) -> bool {
        self.magic == MAGIC_64
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = vec![0u8; IMAGE_SIZE];

        // IMAGE_DOS_HEADER
        data[0..2].copy_from_slice(b"MZ");
        put_u32(&mut data, 0x3C, PE_OFFSET as u32);
        data[0x40..0x40 + 14].copy_from_slice(b"This program c");

        data[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

        // IMAGE_FILE_HEADER
        let optional_size: u16 = if self.is_pe64() { 240 } else { 224 };
        let machine: u16 = if self.is_pe64() { 0x8664 } else { 0x014C };
        put_u16(&mut data, FILE_HEADER_OFFSET, machine);
        put_u16(&mut data, FILE_HEADER_OFFSET + 2, 1);
        put_u32(&mut data, FILE_HEADER_OFFSET + 4, self.timestamp);
        put_u16(&mut data, FILE_HEADER_OFFSET + 16, optional_size);
        put_u16(&mut data, FILE_HEADER_OFFSET + 18, 0x2102);

        // Optional header
        let optional = OPTIONAL_HEADER_OFFSET;
        put_u16(&mut data, optional, self.magic);
        put_u32(&mut data, optional + 16, SECTION_RVA + 0x100);
        put_u32(&mut data, optional + 32, 0x1000);
        put_u32(&mut data, optional + 36, 0x200);
        put_u32(&mut data, optional + 56, 0x2000);
        put_u32(&mut data, optional + 60, SIZE_OF_HEADERS);
        put_u32(&mut data, optional + 64, DEFAULT_CHECKSUM);
        let (count_offset, directories) = if self.is_pe64() {
            (optional + 108, optional + 112)
        } else {
            (optional + 92, optional + 96)
        };
        put_u32(&mut data, count_offset, 16);

        if self.export {
            put_u32(&mut data, directories, rva(EXPORT_OFFSET));
            put_u32(&mut data, directories + 4, 40);
            put_u32(&mut data, EXPORT_OFFSET + 4, self.timestamp);
            put_u32(&mut data, EXPORT_OFFSET + 12, rva(EXPORT_OFFSET) + 0x28);
        }

        if self.resource {
            put_u32(&mut data, directories + 2 * 8, rva(RESOURCE_OFFSET));
            put_u32(&mut data, directories + 2 * 8 + 4, 16);
            put_u32(&mut data, RESOURCE_OFFSET + 4, self.timestamp);
        }

        if self.debug {
            let entries = if self.extra_debug_type.is_some() { 2 } else { 1 };
            put_u32(&mut data, directories + 6 * 8, rva(DEBUG_OFFSET));
            put_u32(&mut data, directories + 6 * 8 + 4, entries * 28);

            let pointer = self.codeview_pointer.unwrap_or(CODEVIEW_OFFSET as u32);
            let debug_timestamp = self.debug_timestamp.unwrap_or(self.timestamp);
            self.debug_entry(&mut data, DEBUG_OFFSET, IMAGE_DEBUG_TYPE_CODEVIEW, pointer, debug_timestamp);
            if let Some(debug_type) = self.extra_debug_type {
                self.debug_entry(&mut data, DEBUG_OFFSET + 28, debug_type, pointer, debug_timestamp);
            }

            data[CODEVIEW_OFFSET..CODEVIEW_OFFSET + 4].copy_from_slice(b"RSDS");
            data[CODEVIEW_OFFSET + 4..CODEVIEW_OFFSET + 20].copy_from_slice(&self.codeview_guid);
            put_u32(&mut data, CODEVIEW_OFFSET + 20, self.codeview_age);
            data[CODEVIEW_OFFSET + 24..CODEVIEW_OFFSET + 32].copy_from_slice(b"app.pdb\0");
        }

        // Section header
        let section = OPTIONAL_HEADER_OFFSET + optional_size as usize;
        data[section..section + 8].copy_from_slice(b".rdata\0\0");
        put_u32(&mut data, section + 8, SECTION_SIZE as u32);
        put_u32(&mut data, section + 12, SECTION_RVA);
        put_u32(&mut data, section + 16, SECTION_SIZE as u32);
        put_u32(&mut data, section + 20, SECTION_RAW_OFFSET as u32);
        put_u32(&mut data, section + 36, 0x4000_0040);

        for (index, byte) in data[SECTION_RAW_OFFSET + 0x100..].iter_mut().enumerate() {
            *byte = self.filler.wrapping_add(index as u8);
        }

        data
    }

    fn debug_entry(&self, data: &mut [u8], offset: usize, debug_type: u32, pointer: u32, timestamp: u32) {
        put_u32(data, offset + 4, timestamp);
        put_u32(data, offset + 12, debug_type);
        put_u32(data, offset + 16, 32);
        put_u32(data, offset + 20, rva(CODEVIEW_OFFSET));
        put_u32(data, offset + 24, pointer);
    }
}
