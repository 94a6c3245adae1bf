//! Verifying and rewriting the PDB that belongs to an image.
//!
//! The PDB is never modified in place. The rewritten container is written to
//! `<pdb>.tmp` first and only renamed over the original once it is complete and synced.
//! On any failure the temporary file is removed again and the original PDB is untouched.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use uguid::Guid;

use crate::{
    file::parser::Parser,
    patch::PatchValues,
    pdb::{container::PdbStreams, PdbHeaderStream, PdbStreamType},
    pe::PdbMatchRecord,
    Error, Result,
};

/// Suffix appended to the PDB path for the file being written.
pub const TEMP_PDB_SUFFIX: &str = ".tmp";

/// DBI `VersionSignature` of every DBI stream newer than VC 4.1.
const DBI_VERSION_SIGNATURE: i32 = -1;

/// The identity a rewritten PDB receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdbIdentity {
    /// Header stream timestamp
    pub timestamp: u32,
    /// Header and DBI stream age
    pub age: u32,
    /// Header stream GUID
    pub guid: Guid,
}

impl From<&PatchValues> for PdbIdentity {
    fn from(values: &PatchValues) -> Self {
        PdbIdentity {
            timestamp: values.timestamp,
            age: values.pdb_age,
            guid: values.pdb_signature,
        }
    }
}

/// Returns the path of the temporary file `pdb_path` is rewritten into.
#[must_use]
pub fn temp_pdb_path(pdb_path: &Path) -> PathBuf {
    let mut path = OsString::from(pdb_path.as_os_str());
    path.push(TEMP_PDB_SUFFIX);
    PathBuf::from(path)
}

/// Removes the temporary PDB on drop unless it has been committed.
struct TempPdb {
    path: PathBuf,
    armed: bool,
}

impl TempPdb {
    fn create(path: PathBuf) -> Result<(Self, fs::File)> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|error| Error::io("Failed to open file", &path, error))?;

        Ok((TempPdb { path, armed: true }, file))
    }

    fn commit(mut self, destination: &Path) -> Result<()> {
        fs::rename(&self.path, destination)
            .map_err(|error| Error::io("Failed to replace PDB", destination, error))?;
        self.armed = false;
        Ok(())
    }

    fn discard(mut self) -> Result<()> {
        fs::remove_file(&self.path)
            .map_err(|error| Error::io("Failed to delete temporary PDB", &self.path, error))?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for TempPdb {
    fn drop(&mut self) {
        if self.armed {
            if let Err(error) = fs::remove_file(&self.path) {
                log::warn!(
                    "could not remove temporary PDB '{}': {}",
                    self.path.display(),
                    error
                );
            }
        }
    }
}

/// Verifies that the PDB at `pdb_path` belongs to the image described by `record` and
/// replaces its identity with `identity`.
///
/// The header stream receives the new timestamp, age and GUID, the DBI stream the new age,
/// and the stream table copy (stream 0) is emptied. With `dry_run` the rewritten PDB is
/// produced and then deleted; the original stays as it is.
///
/// Returns the header stream as it was before the rewrite.
///
/// # Errors
/// - [`crate::Error::Io`] if the PDB cannot be opened, or the temporary file cannot be
///   written, deleted or renamed
/// - [`crate::Error::InvalidPdb`] if the container is malformed, the header stream is
///   missing, short or too old, or `record` is absent or does not match the header
pub fn rewrite_pdb(
    pdb_path: &Path,
    record: Option<&PdbMatchRecord>,
    identity: &PdbIdentity,
    dry_run: bool,
) -> Result<PdbHeaderStream> {
    let pdb = fs::File::open(pdb_path)
        .map_err(|error| Error::io("Failed to open PDB file", pdb_path, error))?;

    let (temp, temp_file) = TempPdb::create(temp_pdb_path(pdb_path))?;

    let original = {
        let mut streams = PdbStreams::read(pdb)?;

        let header_stream = streams
            .get_stream(PdbStreamType::Header)
            .ok_or_else(|| invalid_pdb!("missing PDB header stream"))?;
        let original = PdbHeaderStream::parse(header_stream)?;

        match record {
            Some(record) if record.matches(&original) => {}
            _ => return Err(invalid_pdb!("PE and PDB signatures do not match")),
        }

        log::info!("PDB Timestamp: {}", original.timestamp);
        log::info!("PDB Age: {}", original.age);

        rewrite_streams(&mut streams, &original, identity)?;

        let writer = temp_file
            .try_clone()
            .map_err(|error| Error::io("Failed to write temporary PDB", &temp.path, error))?;
        streams.write(writer).map_err(|error| match error {
            Error::FileError(error) => Error::io("Failed to write temporary PDB", &temp.path, error),
            other => other,
        })?;
        temp_file
            .sync_all()
            .map_err(|error| Error::io("Failed to write temporary PDB", &temp.path, error))?;
        drop(temp_file);

        original
    };

    if dry_run {
        temp.discard()?;
    } else {
        temp.commit(pdb_path)?;
    }

    Ok(original)
}

fn rewrite_streams(
    streams: &mut PdbStreams,
    original: &PdbHeaderStream,
    identity: &PdbIdentity,
) -> Result<()> {
    streams.replace_stream(PdbStreamType::StreamTable.index(), Some(Vec::new()))?;

    let header = PdbHeaderStream {
        version: original.version,
        timestamp: identity.timestamp,
        age: identity.age,
        guid: identity.guid,
    };
    if let Some(stream) = streams.stream_mut(PdbStreamType::Header.index()) {
        header.write(stream)?;
    }

    if let Some(dbi) = streams.stream_mut(PdbStreamType::DebugInfo.index()) {
        if let Some(offset) = dbi_age_offset(dbi) {
            dbi[offset..offset + 4].copy_from_slice(&identity.age.to_le_bytes());
        }
    }

    Ok(())
}

/// Offset of `Age` in a DBI stream with the VC 7.0+ header, `None` for older or short ones.
fn dbi_age_offset(dbi: &[u8]) -> Option<usize> {
    let mut parser = Parser::new(dbi);
    if parser.read_le::<i32>().ok()? != DBI_VERSION_SIGNATURE {
        return None;
    }
    // VersionHeader
    parser.advance_by(4).ok()?;

    let offset = parser.pos();
    parser.read_le::<u32>().ok()?;
    Some(offset)
}
