//! Fixtures shared by the integration tests.
//!
//! A [`Build`] describes one output of a fake toolchain run: the same code bytes with
//! whatever timestamp, GUID and age the linker happened to pick. [`Build::image`] and
//! [`Build::pdb`] produce a matching image/PDB pair.

#![allow(dead_code)]

use std::{
    fs,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use tempfile::TempDir;

use pezap::pdb::{container::PdbStreams, PDB_VERSION_VC70};

const PE_OFFSET: usize = 0x80;
const SECTION_RVA: u32 = 0x1000;
const SECTION_RAW: usize = 0x400;
const SECTION_SIZE: usize = 0x400;

pub const FILE_HEADER: usize = PE_OFFSET + 4;
pub const OPTIONAL_HEADER: usize = FILE_HEADER + 20;
pub const EXPORT: usize = SECTION_RAW;
pub const RESOURCE: usize = SECTION_RAW + 0x40;
pub const DEBUG: usize = SECTION_RAW + 0x60;
pub const CODEVIEW: usize = SECTION_RAW + 0xC0;

/// Fields that differ between two builds of the same sources.
#[derive(Debug, Clone)]
pub struct Build {
    pub pe64: bool,
    pub magic: Option<u16>,
    pub timestamp: u32,
    pub guid: [u8; 16],
    pub age: u32,
    pub code: u8,
    pub codeview_entries: usize,
    pub pdb_header_len: Option<usize>,
    pub pdb_version: u32,
    /// Number of PDB streams written; fewer than 2 drops the header stream.
    pub pdb_streams: usize,
}

impl Build {
    pub fn pe32(timestamp: u32, guid: [u8; 16], age: u32) -> Self {
        Build {
            pe64: false,
            magic: None,
            timestamp,
            guid,
            age,
            code: 0x55,
            codeview_entries: 1,
            pdb_header_len: None,
            pdb_version: PDB_VERSION_VC70,
            pdb_streams: 5,
        }
    }

    pub fn pe64(timestamp: u32, guid: [u8; 16], age: u32) -> Self {
        Build {
            pe64: true,
            ..Build::pe32(timestamp, guid, age)
        }
    }

    pub fn image(&self) -> Vec<u8> {
        let mut data = vec![0u8; SECTION_RAW + SECTION_SIZE];
        data[0..2].copy_from_slice(b"MZ");
        put(&mut data, 0x3C, PE_OFFSET as u32);
        data[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

        let optional_size: u16 = if self.pe64 { 240 } else { 224 };
        data[FILE_HEADER..FILE_HEADER + 2]
            .copy_from_slice(&(if self.pe64 { 0x8664_u16 } else { 0x014C }).to_le_bytes());
        data[FILE_HEADER + 2..FILE_HEADER + 4].copy_from_slice(&1_u16.to_le_bytes());
        put(&mut data, FILE_HEADER + 4, self.timestamp);
        data[FILE_HEADER + 16..FILE_HEADER + 18].copy_from_slice(&optional_size.to_le_bytes());

        let magic = self.magic.unwrap_or(if self.pe64 { 0x20B } else { 0x10B });
        data[OPTIONAL_HEADER..OPTIONAL_HEADER + 2].copy_from_slice(&magic.to_le_bytes());
        put(&mut data, OPTIONAL_HEADER + 60, SECTION_RAW as u32);
        put(&mut data, OPTIONAL_HEADER + 64, self.timestamp ^ 0x5A5A);
        let (count, directories) = if self.pe64 {
            (OPTIONAL_HEADER + 108, OPTIONAL_HEADER + 112)
        } else {
            (OPTIONAL_HEADER + 92, OPTIONAL_HEADER + 96)
        };
        put(&mut data, count, 16);

        let rva = |offset: usize| SECTION_RVA + (offset - SECTION_RAW) as u32;

        put(&mut data, directories, rva(EXPORT));
        put(&mut data, directories + 4, 40);
        put(&mut data, EXPORT + 4, self.timestamp);

        put(&mut data, directories + 16, rva(RESOURCE));
        put(&mut data, directories + 20, 16);
        put(&mut data, RESOURCE + 4, self.timestamp);

        // CodeView entries, then one POGO entry.
        let entries = self.codeview_entries + 1;
        put(&mut data, directories + 48, rva(DEBUG));
        put(&mut data, directories + 52, (entries * 28) as u32);
        for index in 0..entries {
            let entry = DEBUG + index * 28;
            let debug_type = if index < self.codeview_entries { 2 } else { 13 };
            put(&mut data, entry + 4, self.timestamp);
            put(&mut data, entry + 12, debug_type);
            put(&mut data, entry + 16, 32);
            put(&mut data, entry + 20, rva(CODEVIEW));
            put(&mut data, entry + 24, CODEVIEW as u32);
        }
        data[CODEVIEW..CODEVIEW + 4].copy_from_slice(b"RSDS");
        data[CODEVIEW + 4..CODEVIEW + 20].copy_from_slice(&self.guid);
        put(&mut data, CODEVIEW + 20, self.age);
        data[CODEVIEW + 24..CODEVIEW + 32].copy_from_slice(b"app.pdb\0");

        let section = OPTIONAL_HEADER + optional_size as usize;
        data[section..section + 8].copy_from_slice(b".text\0\0\0");
        put(&mut data, section + 8, SECTION_SIZE as u32);
        put(&mut data, section + 12, SECTION_RVA);
        put(&mut data, section + 16, SECTION_SIZE as u32);
        put(&mut data, section + 20, SECTION_RAW as u32);

        for (index, byte) in data[SECTION_RAW + 0x100..].iter_mut().enumerate() {
            *byte = self.code ^ (index as u8);
        }

        data
    }

    pub fn pdb(&self) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(&self.pdb_version.to_le_bytes());
        header.extend_from_slice(&self.timestamp.to_le_bytes());
        header.extend_from_slice(&self.age.to_le_bytes());
        header.extend_from_slice(&self.guid);
        header.extend_from_slice(&[0u8; 12]);
        if let Some(len) = self.pdb_header_len {
            header.truncate(len);
        }

        let mut dbi = Vec::new();
        dbi.extend_from_slice(&(-1_i32).to_le_bytes());
        dbi.extend_from_slice(&19_990_903_u32.to_le_bytes());
        dbi.extend_from_slice(&self.age.to_le_bytes());
        dbi.extend(std::iter::repeat(self.code).take(40));

        // The old directory copy differs between builds.
        let contents = [
            Some(self.timestamp.to_le_bytes().repeat(50)),
            Some(header),
            Some(vec![self.code; 3000]),
            Some(dbi),
            None,
        ];
        let mut streams = PdbStreams::new();
        for (index, stream) in contents.into_iter().take(self.pdb_streams).enumerate() {
            streams.replace_stream(index, stream).unwrap();
        }

        let mut file = tempfile::tempfile().unwrap();
        streams.write(file.try_clone().unwrap()).unwrap();
        let mut data = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut data).unwrap();
        data
    }
}

fn put(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

/// A scratch directory that is removed when dropped.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new(name: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("pezap_{name}_"))
            .tempdir()
            .unwrap();
        Workspace { dir }
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
