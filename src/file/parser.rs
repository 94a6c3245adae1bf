//! Cursor-based little-endian parser for header and stream decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor over a byte slice
//! with bounds-checked reads. It is used to decode the PDB header stream and the start of
//! the DBI stream, where fields are laid out sequentially.
//!
//! # Usage Examples
//!
//! ```rust
//! use pezap::Parser;
//!
//! let data = [0x94, 0x2E, 0x31, 0x01, 0xAA, 0xBB];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_le::<u32>()?, 20_000_404);
//! assert_eq!(parser.read_bytes(2)?, &[0xAA, 0xBB]);
//! assert_eq!(parser.pos(), 6);
//! # Ok::<(), pezap::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, LeIO},
    Error::OutOfBounds,
    Result,
};

/// A cursor over a byte slice with bounds-checked little-endian reads.
///
/// Every read either succeeds completely and advances the cursor, or fails with
/// [`crate::Error::OutOfBounds`] and leaves the cursor where it was.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if that would move past the end of the data.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let end = self.calc_end_position(step)?;
        self.position = end;
        Ok(())
    }

    /// Returns the current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self.position.checked_add(length).ok_or(OutOfBounds)?;

        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(end)
    }

    /// Read a little-endian value of type `T` and advance the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data remains.
    pub fn read_le<T: LeIO>(&mut self) -> Result<T> {
        read_le_at(self.data, &mut self.position)
    }

    /// Read `length` raw bytes and advance the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data remains.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read a fixed-size byte array and advance the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data remains.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }
}
