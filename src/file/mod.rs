//! Byte-addressable access to the image being patched.
//!
//! This module provides the [`crate::file::Image`] type, a writable, length-stable view of a
//! PE image, together with the backends it can be built on and the low-level primitives
//! used to decode binary structures.
//!
//! # Architecture
//!
//! An [`crate::file::Image`] wraps a [`crate::file::Backend`]:
//!
//! - [`crate::file::physical::Physical`] - a memory-mapped file. Mapped read-write for a real
//!   patch run, or as a private copy-on-write mapping for a dry run, so that writes can
//!   never reach the file on disk.
//! - `Memory` - an owned buffer, used for in-memory processing and tests.
//!
//! The length of an image never changes. Every structure read from it is range-checked
//! against that length before it is dereferenced, and the only mutation entry point is
//! crate-internal and used exclusively by [`crate::patch::PatchSet::apply`].
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pezap::file::{Image, MapMode};
//! use std::path::Path;
//!
//! let image = Image::open(Path::new("app.exe"), MapMode::CopyOnWrite)?;
//! let e_lfanew: u32 = image.read_le(0x3C, "e_lfanew")?;
//! println!("PE header at 0x{:x} of {} bytes", e_lfanew, image.len());
//! # Ok::<(), pezap::Error>(())
//! ```

pub mod io;
mod memory;
pub mod parser;
pub mod physical;

use std::path::Path;

use crate::{file::io::LeIO, Error::OutOfBounds, Result};
use memory::Memory;
use physical::Physical;

pub use physical::MapMode;

/// Backend trait for image data sources.
///
/// This trait abstracts over the storage of an image, allowing both memory-mapped files
/// and owned buffers to be patched through the same interface. All implementations must be
/// thread-safe.
pub trait Backend: Send + Sync {
    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the entire data buffer for in-place modification.
    ///
    /// The returned slice always has the same length as [`Backend::data`].
    fn data_mut(&mut self) -> &mut [u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;

    /// Makes all modifications durable.
    ///
    /// For a writable file mapping this flushes dirty pages to disk. Backends without
    /// persistent storage do nothing.
    ///
    /// # Errors
    /// Returns an error if the underlying storage fails to synchronize.
    fn flush(&self) -> Result<()>;
}

/// A PE image loaded for patching.
///
/// The image is a byte buffer of fixed length, addressed by file offset. It is released
/// (unmapped) when dropped, on success and failure alike.
///
/// # Examples
///
/// ```rust
/// use pezap::file::Image;
///
/// let image = Image::from_mem(vec![0x4D, 0x5A, 0x90, 0x00])?;
/// assert_eq!(image.read_le::<u16>(0, "e_magic")?, 0x5A4D);
/// assert!(image.read_le::<u32>(2, "e_cblp").is_err());
/// # Ok::<(), pezap::Error>(())
/// ```
pub struct Image {
    data: Box<dyn Backend>,
}

impl Image {
    /// Opens and maps the image at `path`.
    ///
    /// # Arguments
    /// * `path` - Path to the image on disk.
    /// * `mode` - [`MapMode::ReadWrite`] to patch the file in place, or
    ///   [`MapMode::CopyOnWrite`] to keep every modification private to this process.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] if the file cannot be opened or mapped, and
    /// [`crate::Error::InvalidImage`] if the file is empty.
    pub fn open(path: &Path, mode: MapMode) -> Result<Image> {
        let file = mode
            .open_options()
            .open(path)
            .map_err(|error| crate::Error::io("Failed to open image", path, error))?;

        let length = file
            .metadata()
            .map_err(|error| crate::Error::io("Failed to query image size", path, error))?
            .len();
        if length == 0 {
            return Err(invalid_image!("image '{}' is empty", path.display()));
        }

        let physical = Physical::from_std_file(&file, mode)
            .map_err(|error| crate::Error::io("Failed to map image", path, error))?;

        Self::load(physical)
    }

    /// Loads an image from an owned buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the buffer is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<Image> {
        Self::load(Memory::new(data))
    }

    fn load<T: Backend + 'static>(data: T) -> Result<Image> {
        if data.len() == 0 {
            return Err(invalid_image!("image is empty"));
        }

        Ok(Image {
            data: Box::new(data),
        })
    }

    /// Returns the total size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the image has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the complete image data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns `true` if `[offset, offset + len)` lies within the image.
    #[must_use]
    pub fn is_valid_range(&self, offset: usize, len: usize) -> bool {
        offset
            .checked_add(len)
            .is_some_and(|end| end <= self.data.len())
    }

    /// Returns a slice of `len` bytes at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        if !self.is_valid_range(offset, len) {
            return Err(OutOfBounds);
        }

        Ok(&self.data.data()[offset..offset + len])
    }

    /// Reads a little-endian value at `offset`.
    ///
    /// `what` names the field for the error message.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidImage`] if the field lies outside the image.
    pub fn read_le<T: LeIO>(&self, offset: usize, what: &str) -> Result<T> {
        let mut cursor = offset;
        io::read_le_at(self.data.data(), &mut cursor).map_err(|_| {
            invalid_image!(
                "{} at offset 0x{:x} lies outside the image ({} bytes)",
                what,
                offset,
                self.data.len()
            )
        })
    }

    /// Overwrites `bytes.len()` bytes at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub(crate) fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        if !self.is_valid_range(offset, bytes.len()) {
            return Err(OutOfBounds);
        }

        self.data.data_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Makes all written patches durable on the backing storage.
    ///
    /// # Errors
    /// Returns an error if the backing storage fails to synchronize.
    pub fn flush(&self) -> Result<()> {
        self.data.flush()
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image").field("len", &self.len()).finish()
    }
}
