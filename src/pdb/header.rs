//! The PDB header stream (stream 1).
//!
//! ```text
//! offset  size  field
//! 0       4     Version
//! 4       4     Signature (timestamp)
//! 8       4     Age
//! 12      16    Guid
//! 28      n     named stream map, feature codes (left untouched)
//! ```

use uguid::Guid;

use crate::{
    file::{io::write_le, parser::Parser},
    pdb::PDB_VERSION_VC70,
    Result,
};

/// The identity fields at the start of the header stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdbHeaderStream {
    /// Implementation version, `PdbImplVC70` or later
    pub version: u32,
    /// Build timestamp
    pub timestamp: u32,
    /// Number of times the PDB has been written
    pub age: u32,
    /// Unique identity shared with the image's CodeView record
    pub guid: Guid,
}

impl PdbHeaderStream {
    /// Size of the fixed PDB 7.0 header.
    pub const SIZE: usize = 28;

    /// Parses the start of a header stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPdb`] if the stream is shorter than the PDB 7.0 header
    /// or its version predates VC 7.0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pezap::pdb::PdbHeaderStream;
    ///
    /// let mut stream = Vec::new();
    /// stream.extend_from_slice(&20_000_404_u32.to_le_bytes());
    /// stream.extend_from_slice(&0x5F5E_1000_u32.to_le_bytes());
    /// stream.extend_from_slice(&3_u32.to_le_bytes());
    /// stream.extend_from_slice(&[0xAB; 16]);
    ///
    /// let header = PdbHeaderStream::parse(&stream)?;
    /// assert_eq!(header.age, 3);
    /// # Ok::<(), pezap::Error>(())
    /// ```
    pub fn parse(stream: &[u8]) -> Result<Self> {
        if stream.len() < Self::SIZE {
            return Err(invalid_pdb!("missing PDB 7.0 header"));
        }

        let mut parser = Parser::new(stream);
        let header = PdbHeaderStream {
            version: parser.read_le()?,
            timestamp: parser.read_le()?,
            age: parser.read_le()?,
            guid: Guid::from_bytes(parser.read_array()?),
        };

        if header.version < PDB_VERSION_VC70 {
            return Err(invalid_pdb!("unsupported PDB implementation version"));
        }

        Ok(header)
    }

    /// Overwrites the identity fields at the start of `stream`, leaving the rest intact.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream is shorter than the header.
    pub fn write(&self, stream: &mut [u8]) -> Result<()> {
        if stream.len() < Self::SIZE {
            return Err(crate::Error::OutOfBounds);
        }

        write_le(&mut stream[0..], self.version)?;
        write_le(&mut stream[4..], self.timestamp)?;
        write_le(&mut stream[8..], self.age)?;
        stream[12..Self::SIZE].copy_from_slice(&self.guid.to_bytes());
        Ok(())
    }
}
