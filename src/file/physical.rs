//! Physical file backend for memory-mapped I/O.
//!
//! This module provides the [`crate::file::physical::Physical`] backend that implements the
//! [`crate::file::Backend`] trait for files on disk. Images are patched in place, so the
//! file is mapped writable and never resized. The mapping mode decides whether writes reach
//! the file:
//!
//! - [`MapMode::ReadWrite`] - a shared mapping; writes are visible in the file after
//!   [`crate::file::Backend::flush`].
//! - [`MapMode::CopyOnWrite`] - a private mapping of a read-only handle; writes only ever
//!   touch process-private pages. Used for dry runs.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use pezap::file::{physical::Physical, Backend, MapMode};
//!
//! let file = MapMode::CopyOnWrite.open_options().open("app.exe")?;
//! let physical = Physical::from_std_file(&file, MapMode::CopyOnWrite)?;
//! assert_eq!(&physical.data()[0..2], b"MZ");
//! # Ok::<(), std::io::Error>(())
//! ```

use super::Backend;
use crate::Result;

use memmap2::{MmapMut, MmapOptions};
use std::fs;

/// How a file is mapped into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Open the file read-write and map it shared; modifications are written back.
    ReadWrite,
    /// Open the file read-only and map it private; modifications are discarded.
    CopyOnWrite,
}

impl MapMode {
    /// Returns the [`fs::OpenOptions`] required to map a file in this mode.
    #[must_use]
    pub fn open_options(self) -> fs::OpenOptions {
        let mut options = fs::OpenOptions::new();
        options.read(true);
        if self == MapMode::ReadWrite {
            options.write(true);
        }
        options
    }
}

/// A file backend that uses memory-mapped I/O.
///
/// The mapping keeps the file alive until the backend is dropped; dropping it unmaps the
/// file on every exit path.
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: MmapMut,
    /// How the file was mapped
    mode: MapMode,
}

impl Physical {
    /// Map an already opened file.
    ///
    /// The handle must have been opened with [`MapMode::open_options`] for the same `mode`.
    ///
    /// # Errors
    /// Returns the OS error if the mapping fails.
    pub fn from_std_file(file: &fs::File, mode: MapMode) -> std::io::Result<Physical> {
        // The mapping stays valid after `file` is closed.
        let data = match mode {
            MapMode::ReadWrite => unsafe { MmapMut::map_mut(file)? },
            MapMode::CopyOnWrite => unsafe { MmapOptions::new().map_copy(file)? },
        };

        Ok(Physical { data, mode })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn flush(&self) -> Result<()> {
        if self.mode == MapMode::ReadWrite {
            self.data.flush()?;
        }
        Ok(())
    }
}
