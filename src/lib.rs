// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # pezap
//!
//! Makes Windows PE images and their PDB files byte-for-byte reproducible.
//!
//! Compilers and linkers embed values into every build that change even when the sources
//! do not: the link timestamp, the optional header checksum, the timestamps of the export,
//! resource and debug directories, and the GUID and age that pair an image with its PDB.
//! `pezap` overwrites all of them with deterministic values, so two builds of the same
//! sources produce identical files.
//!
//! ## Features
//!
//! - **Deferred patching** - Every field is recorded first and written last; a failure
//!   anywhere leaves the image untouched
//! - **PE32 and PE32+** - Both optional header layouts, handled by one generic code path
//! - **Content-derived PDB signature** - The new GUID is the MD5 digest of every byte
//!   that is not patched
//! - **PDB rewriting** - The PDB identity is rewritten through a temporary file and an
//!   atomic rename
//! - **Dry runs** - All checks, no modifications
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pezap::prelude::*;
//! use std::path::Path;
//!
//! let report = Patcher::new(PatchOptions::default())
//!     .run(Path::new("app.exe"), Some(Path::new("app.pdb")))?;
//!
//! println!("Patched {} fields, PDB signature {}", report.patch_count(), report.signature());
//! # Ok::<(), pezap::Error>(())
//! ```
//!
//! ### Working on a buffer
//!
//! ```rust
//! use pezap::{file::Image, pe::PeFile, Error};
//!
//! let image = Image::from_mem(vec![0u8; 64])?;
//! assert!(matches!(PeFile::parse(&image), Err(Error::InvalidImage { .. })));
//! # Ok::<(), pezap::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - Memory-mapped or in-memory image access with bounds-checked reads
//! - [`pe`] - The PE/COFF header chain and discovery of non-deterministic fields
//! - [`patch`] - The deferred patch list and the checksum over unpatched bytes
//! - [`pdb`] - The MSF container, the PDB header stream and the PDB rewrite
//! - [`patcher`] - The staged run tying it all together
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Deterministic Values
//!
//! | Field | Value |
//! |-------|-------|
//! | every `TimeDateStamp`, `CheckSum` | [`DETERMINISTIC_TIMESTAMP`] (2010-01-01T00:00:00Z) |
//! | PDB age | [`DETERMINISTIC_PDB_AGE`] |
//! | PDB signature | MD5 of the image, skipping every patched field |
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! cargo +nightly fuzz run image --release
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use pezap::prelude::*;
/// use std::path::Path;
///
/// let report = Patcher::new(PatchOptions::dry_run()).run(Path::new("app.dll"), None)?;
/// println!("{} fields", report.patch_count());
/// # Ok::<(), pezap::Error>(())
/// ```
pub mod prelude;

/// Image access: memory mapped files, owned buffers and little-endian primitives.
///
/// # Key Types
///
/// - [`file::Image`] - The image being patched
/// - [`file::MapMode`] - Shared read-write or private copy-on-write mapping
/// - [`file::parser::Parser`] - Cursor over a byte slice
pub mod file;

/// PE/COFF header parsing.
pub mod pe;

/// Deferred patches and the checksum over the unpatched bytes.
pub mod patch;

/// PDB 7.0 container and header stream handling.
pub mod pdb;

/// The staged patch run.
pub mod patcher;

/// `pezap` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use pezap::{file::Image, Result};
///
/// fn load(data: Vec<u8>) -> Result<usize> {
///     Ok(Image::from_mem(data)?.len())
/// }
/// assert_eq!(load(vec![1, 2, 3]).unwrap(), 3);
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `pezap` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

pub use file::{parser::Parser, Image};
pub use patch::{DETERMINISTIC_PDB_AGE, DETERMINISTIC_TIMESTAMP};
pub use patcher::{PatchOptions, PatchReport, Patcher, Stage};
