//! Program database (PDB 7.0) support.
//!
//! A PDB is an MSF container: a small file system made of fixed-size blocks that holds a
//! number of independent streams. Only three of them matter for reproducible builds:
//!
//! - stream 0, the copy of the previous stream directory, which is dropped
//! - stream 1, the header stream, which carries the identity (timestamp, age, GUID)
//! - stream 3, the DBI stream, which repeats the age
//!
//! # Key Components
//!
//! - [`container::PdbStreams`] - The stream contents, read and written through `ms-pdb-msf`
//! - [`PdbHeaderStream`] - The identity carried in stream 1
//! - [`rewrite_pdb`] - Verifies that a PDB belongs to an image and rewrites its identity
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pezap::pdb::{container::PdbStreams, PdbHeaderStream, PdbStreamType};
//!
//! let streams = PdbStreams::read(std::fs::File::open("app.pdb")?)?;
//! if let Some(stream) = streams.get_stream(PdbStreamType::Header) {
//!     let header = PdbHeaderStream::parse(stream)?;
//!     println!("{} age {}", header.guid, header.age);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod container;
pub mod header;
pub mod rewrite;

use strum::{Display, EnumIter};

pub use header::PdbHeaderStream;
pub use rewrite::{rewrite_pdb, PdbIdentity, TEMP_PDB_SUFFIX};

/// `PdbImplVC70`, the oldest supported header stream version.
pub const PDB_VERSION_VC70: u32 = 20_000_404;

/// The fixed stream indices of a PDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum PdbStreamType {
    /// Copy of the previous stream directory
    #[strum(to_string = "stream table")]
    StreamTable,
    /// PDB header stream
    #[strum(to_string = "header")]
    Header,
    /// Type information (TPI)
    #[strum(to_string = "TPI")]
    TypeInfo,
    /// Debug information (DBI)
    #[strum(to_string = "DBI")]
    DebugInfo,
    /// Id information (IPI)
    #[strum(to_string = "IPI")]
    IdInfo,
}

impl PdbStreamType {
    /// Index of this stream in the stream directory.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}
