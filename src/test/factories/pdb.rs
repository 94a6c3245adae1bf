//! Synthetic PDB files.

use std::io::{Read, Seek, SeekFrom};

use crate::pdb::{container::PdbStreams, PDB_VERSION_VC70};

pub const DBI_AGE_OFFSET: usize = 8;
pub const DEFAULT_PDB_TIMESTAMP: u32 = 0x6512_3457;

#[derive(Debug, Clone)]
pub struct PdbBuilder {
    guid: [u8; 16],
    age: u32,
    timestamp: u32,
    version: u32,
    header_len: Option<usize>,
}

impl PdbBuilder {
    pub fn new(guid: [u8; 16], age: u32) -> Self {
        PdbBuilder {
            guid,
            age,
            timestamp: DEFAULT_PDB_TIMESTAMP,
            version: PDB_VERSION_VC70,
            header_len: None,
        }
    }

    pub fn timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Truncates the header stream to `len` bytes.
    pub fn header_len(mut self, len: usize) -> Self {
        self.header_len = Some(len);
        self
    }

    pub fn header_stream(&self) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(&self.version.to_le_bytes());
        header.extend_from_slice(&self.timestamp.to_le_bytes());
        header.extend_from_slice(&self.age.to_le_bytes());
        header.extend_from_slice(&self.guid);
        // Empty named stream map
        header.extend_from_slice(&[0u8; 16]);
        if let Some(len) = self.header_len {
            header.truncate(len);
        }
        header
    }

    pub fn dbi_stream(&self) -> Vec<u8> {
        let mut dbi = Vec::new();
        dbi.extend_from_slice(&(-1_i32).to_le_bytes());
        dbi.extend_from_slice(&19_990_903_u32.to_le_bytes());
        dbi.extend_from_slice(&self.age.to_le_bytes());
        dbi.extend((0..52u8).map(|b| b.wrapping_mul(7)));
        dbi
    }

    pub fn streams(&self) -> PdbStreams {
        let mut streams = PdbStreams::new();
        streams.replace_stream(0, Some(vec![0x5A; 700])).unwrap();
        streams.replace_stream(1, Some(self.header_stream())).unwrap();
        streams.replace_stream(2, Some(vec![0x42; 1100])).unwrap();
        streams.replace_stream(3, Some(self.dbi_stream())).unwrap();
        streams.replace_stream(4, Some(vec![0x24; 64])).unwrap();
        streams
    }

    pub fn build(&self) -> Vec<u8> {
        Self::store(&self.streams())
    }

    /// Serializes `streams` into the bytes of an MSF container.
    pub fn store(streams: &PdbStreams) -> Vec<u8> {
        let mut file = tempfile::tempfile().unwrap();
        streams.write(file.try_clone().unwrap()).unwrap();

        let mut data = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut data).unwrap();
        data
    }
}
