//! The streams of a PDB, loaded from and stored into an MSF container.
//!
//! Block layout, free page maps and the stream directory are handled by `ms-pdb-msf`.
//! [`PdbStreams`] holds the decoded stream contents in memory, so that the identity
//! fields can be edited before a fresh container is written.

use std::fs::File;

use ms_pdb_msf::{CreateOptions, Msf};
use sync_file::RandomAccessFile;

use crate::{pdb::PdbStreamType, Error, Result};

/// The contents of every stream of a PDB. `None` marks a nil stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdbStreams {
    streams: Vec<Option<Vec<u8>>>,
}

impl PdbStreams {
    /// Creates an empty stream set.
    #[must_use]
    pub fn new() -> Self {
        PdbStreams::default()
    }

    /// Reads every stream of the MSF container in `file`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPdb`] if the file is not an MSF 7.0 container or a
    /// stream cannot be read.
    pub fn read(file: File) -> Result<Self> {
        let msf = Msf::open_with_file(RandomAccessFile::from(file)).map_err(malformed)?;

        let mut streams = Vec::new();
        for index in 0..msf.num_streams() {
            let stream = if msf.is_stream_valid(index) {
                Some(msf.read_stream_to_vec(index).map_err(malformed)?)
            } else {
                None
            };
            streams.push(stream);
        }

        log::debug!("read {} PDB streams", streams.len());
        Ok(PdbStreams { streams })
    }

    /// Number of streams, nil streams included.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Contents of stream `index`; `None` if it is nil or does not exist.
    #[must_use]
    pub fn stream(&self, index: usize) -> Option<&[u8]> {
        self.streams.get(index)?.as_deref()
    }

    /// Mutable contents of stream `index`.
    pub fn stream_mut(&mut self, index: usize) -> Option<&mut Vec<u8>> {
        self.streams.get_mut(index)?.as_mut()
    }

    /// Contents of one of the fixed streams.
    #[must_use]
    pub fn get_stream(&self, stream: PdbStreamType) -> Option<&[u8]> {
        self.stream(stream.index())
    }

    /// Replaces stream `index`, or appends it if `index` equals [`PdbStreams::stream_count`].
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPdb`] if `index` would leave a gap in the directory.
    pub fn replace_stream(&mut self, index: usize, data: Option<Vec<u8>>) -> Result<()> {
        match index.cmp(&self.streams.len()) {
            std::cmp::Ordering::Less => self.streams[index] = data,
            std::cmp::Ordering::Equal => self.streams.push(data),
            std::cmp::Ordering::Greater => {
                return Err(invalid_pdb!(
                    "stream {} is beyond the stream directory ({} streams)",
                    index,
                    self.streams.len()
                ))
            }
        }
        Ok(())
    }

    /// Writes all streams into a new MSF container in `file`, which must be empty and
    /// opened for reading and writing, and commits it.
    ///
    /// Streams keep their indices. The container is built from scratch, so nothing of an
    /// earlier container survives in unused pages.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if writing fails, and
    /// [`crate::Error::InvalidPdb`] if the container rejects a stream.
    pub fn write(&self, file: File) -> Result<()> {
        let mut msf = Msf::create_with_file(RandomAccessFile::from(file), CreateOptions::default())
            .map_err(write_failed)?;

        for (index, stream) in self.streams.iter().enumerate() {
            let index = u32::try_from(index)
                .map_err(|_| invalid_pdb!("too many streams ({})", self.streams.len()))?;

            if index < msf.num_streams() {
                // Reserved by a new container
                if let Some(data) = stream.as_deref().filter(|data| !data.is_empty()) {
                    let mut writer = msf.write_stream(index).map_err(write_failed)?;
                    writer.set_contents(data).map_err(write_failed)?;
                }
                continue;
            }

            let created = match stream {
                Some(data) => {
                    let (created, mut writer) = msf.new_stream().map_err(write_failed)?;
                    writer.set_contents(data).map_err(write_failed)?;
                    created
                }
                None => msf.nil_stream().map_err(write_failed)?,
            };
            if created != index {
                return Err(invalid_pdb!(
                    "container assigned stream {} instead of {}",
                    created,
                    index
                ));
            }
        }

        msf.commit().map_err(write_failed)?;
        Ok(())
    }
}

fn malformed(error: impl Into<anyhow::Error>) -> Error {
    invalid_pdb!("malformed MSF container: {}", error.into())
}

fn write_failed(error: impl Into<anyhow::Error>) -> Error {
    match error.into().downcast::<std::io::Error>() {
        Ok(error) => Error::FileError(error),
        Err(error) => invalid_pdb!("failed to write MSF container: {}", error),
    }
}
