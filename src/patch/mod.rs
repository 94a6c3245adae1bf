//! Deferred patch list for in-place image modification.
//!
//! Parsing an image and modifying it are strictly separated. While the headers are walked,
//! every non-deterministic field is recorded as a [`Patch`]: an offset, a length, a deferred
//! value source and a human readable label. Nothing is written until the whole image has
//! been analysed, the digest has been computed and the PDB (if any) has been rewritten.
//! A parse failure can therefore never leave a half-patched file behind.
//!
//! # Key Components
//!
//! - [`Patch`] - A single deferred overwrite
//! - [`PatchValue`] - Where the bytes of a patch come from
//! - [`PatchValues`] - The concrete values the sources resolve to at apply time
//! - [`PatchSet`] - The ordered collection; sorting, validation, digest and application
//! - [`checksum`] - The digest over everything that is not patched
//!
//! # Usage Examples
//!
//! ```rust
//! use pezap::file::Image;
//! use pezap::patch::{PatchSet, PatchValue, PatchValues};
//!
//! let mut image = Image::from_mem(vec![0xFF; 32])?;
//!
//! let mut patches = PatchSet::new();
//! patches.add(8, PatchValue::Timestamp, "IMAGE_FILE_HEADER.TimeDateStamp");
//! patches.sort();
//!
//! let digest = patches.checksum(image.data())?;
//! let values = PatchValues::new(digest);
//! patches.apply(&mut image, &values, false)?;
//!
//! assert_eq!(&image.data()[8..12], &pezap::DETERMINISTIC_TIMESTAMP.to_le_bytes());
//! # Ok::<(), pezap::Error>(())
//! ```

pub mod checksum;

use uguid::Guid;

use crate::{file::Image, Error, Result};

/// Timestamp written into every patched timestamp field: 2010-01-01T00:00:00Z.
///
/// Zero has a special meaning for these fields, so a fixed, well known point in time is
/// used instead.
pub const DETERMINISTIC_TIMESTAMP: u32 = 1_262_304_000;

/// Age written into the CodeView record of the image and into the PDB.
pub const DETERMINISTIC_PDB_AGE: u32 = 1;

/// The source of the bytes a [`Patch`] writes.
///
/// Values are resolved through [`PatchValues`] when the patch is applied, because the PDB
/// signature is only known after the digest over the image has been computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchValue {
    /// A 32-bit timestamp
    Timestamp,
    /// The 128-bit PDB signature (GUID)
    PdbSignature,
    /// The 32-bit PDB age
    PdbAge,
}

impl PatchValue {
    /// Number of bytes this value occupies in the image.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            PatchValue::Timestamp | PatchValue::PdbAge => 4,
            PatchValue::PdbSignature => 16,
        }
    }
}

/// The concrete values the [`PatchValue`] sources resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchValues {
    /// Value for [`PatchValue::Timestamp`]
    pub timestamp: u32,
    /// Value for [`PatchValue::PdbSignature`]
    pub pdb_signature: Guid,
    /// Value for [`PatchValue::PdbAge`]
    pub pdb_age: u32,
}

impl PatchValues {
    /// Creates the deterministic values for an image whose digest is `digest`.
    #[must_use]
    pub fn new(digest: [u8; checksum::DIGEST_SIZE]) -> Self {
        PatchValues {
            timestamp: DETERMINISTIC_TIMESTAMP,
            pdb_signature: Guid::from_bytes(digest),
            pdb_age: DETERMINISTIC_PDB_AGE,
        }
    }

    /// Returns the little-endian bytes for `value`.
    #[must_use]
    pub fn resolve(&self, value: PatchValue) -> Vec<u8> {
        match value {
            PatchValue::Timestamp => self.timestamp.to_le_bytes().to_vec(),
            PatchValue::PdbSignature => self.pdb_signature.to_bytes().to_vec(),
            PatchValue::PdbAge => self.pdb_age.to_le_bytes().to_vec(),
        }
    }
}

/// A deferred overwrite of `[offset, offset + length)` in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    /// File offset of the first byte to overwrite
    pub offset: usize,
    /// Number of bytes to overwrite
    pub length: usize,
    /// Source of the bytes to write
    pub value: PatchValue,
    /// Human readable name of the patched field
    pub label: &'static str,
}

impl Patch {
    /// File offset one past the last patched byte.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }
}

/// An ordered collection of deferred patches.
///
/// The expected call sequence is [`PatchSet::add`] for every field, [`PatchSet::sort`]
/// once, then [`PatchSet::checksum`] and finally [`PatchSet::apply`]. Both of the latter
/// validate that the set is sorted, in range and free of overlaps before touching any data.
#[derive(Debug, Clone, Default)]
pub struct PatchSet {
    patches: Vec<Patch>,
    sorted: bool,
}

impl PatchSet {
    /// Creates an empty patch set.
    #[must_use]
    pub fn new() -> Self {
        PatchSet::default()
    }

    /// Records a patch of `value` at `offset`.
    ///
    /// Nothing is written and no overlap check happens yet. Adding a patch invalidates a
    /// previous [`PatchSet::sort`].
    pub fn add(&mut self, offset: usize, value: PatchValue, label: &'static str) {
        self.patches.push(Patch {
            offset,
            length: value.size(),
            value,
            label,
        });
        self.sorted = false;
    }

    /// Orders all recorded patches by ascending offset.
    pub fn sort(&mut self) {
        self.patches.sort_by_key(|patch| patch.offset);
        self.sorted = true;
    }

    /// Returns `true` if the set has been sorted since the last [`PatchSet::add`].
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Returns the recorded patches in their current order.
    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Returns the number of recorded patches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Returns `true` if no patch has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Checks that the set is sorted and every patch lies within `image_len` bytes without
    /// overlapping its predecessor. Adjacent patches are allowed.
    ///
    /// # Errors
    /// Returns [`crate::Error::PatchConflict`] describing the first violation.
    pub fn validate(&self, image_len: usize) -> Result<()> {
        if !self.sorted {
            return Err(Error::PatchConflict(
                "patches must be sorted before they are checksummed or applied".to_string(),
            ));
        }

        let mut previous: Option<&Patch> = None;
        for patch in &self.patches {
            match patch.offset.checked_add(patch.length) {
                Some(end) if end <= image_len => {}
                _ => {
                    return Err(Error::PatchConflict(format!(
                        "{} at 0x{:x} ({} bytes) lies outside the image ({} bytes)",
                        patch.label, patch.offset, patch.length, image_len
                    )))
                }
            }

            if let Some(previous) = previous {
                if previous.end() > patch.offset {
                    return Err(Error::PatchConflict(format!(
                        "{} at 0x{:x} overlaps {} at 0x{:x}",
                        patch.label, patch.offset, previous.label, previous.offset
                    )));
                }
            }
            previous = Some(patch);
        }

        Ok(())
    }

    /// Computes the digest of `data`, skipping every patch region.
    ///
    /// # Errors
    /// Returns [`crate::Error::PatchConflict`] if the set fails [`PatchSet::validate`].
    pub fn checksum(&self, data: &[u8]) -> Result<[u8; checksum::DIGEST_SIZE]> {
        self.validate(data.len())?;
        Ok(checksum::compute(data, &self.patches))
    }

    /// Writes every patch into `image`.
    ///
    /// The whole set is validated before the first byte is written. With `dry_run` the
    /// validation still happens but the image is left untouched.
    ///
    /// Returns the number of patches applied (or that would have been applied).
    ///
    /// # Errors
    /// Returns [`crate::Error::PatchConflict`] if the set is unsorted, out of range or
    /// overlapping. This is fatal; no partial application takes place.
    pub fn apply(&self, image: &mut Image, values: &PatchValues, dry_run: bool) -> Result<usize> {
        self.validate(image.len())?;

        for patch in &self.patches {
            let bytes = values.resolve(patch.value);
            if bytes.len() != patch.length {
                return Err(Error::PatchConflict(format!(
                    "{} expects {} bytes but its value has {}",
                    patch.label,
                    patch.length,
                    bytes.len()
                )));
            }

            if dry_run {
                log::debug!("would patch {} at 0x{:x}", patch.label, patch.offset);
                continue;
            }

            image.write_bytes(patch.offset, &bytes)?;
            log::debug!("patched {} at 0x{:x}", patch.label, patch.offset);
        }

        Ok(self.patches.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> PatchValues {
        PatchValues::new([0x11; 16])
    }

    #[test]
    fn sort_orders_by_offset() {
        let mut patches = PatchSet::new();
        patches.add(40, PatchValue::PdbAge, "c");
        patches.add(0, PatchValue::Timestamp, "a");
        patches.add(20, PatchValue::PdbSignature, "b");
        assert!(!patches.is_sorted());

        patches.sort();
        assert!(patches.is_sorted());
        let labels: Vec<_> = patches.patches().iter().map(|p| p.label).collect();
        assert_eq!(labels, ["a", "b", "c"]);
        assert_eq!(patches.patches()[1].length, 16);

        patches.add(60, PatchValue::Timestamp, "d");
        assert!(!patches.is_sorted());
    }

    #[test]
    fn unsorted_set_is_rejected() {
        let mut patches = PatchSet::new();
        patches.add(0, PatchValue::Timestamp, "a");

        let mut image = Image::from_mem(vec![0; 8]).unwrap();
        assert!(matches!(
            patches.apply(&mut image, &values(), false),
            Err(Error::PatchConflict(_))
        ));
        assert!(matches!(
            patches.checksum(image.data()),
            Err(Error::PatchConflict(_))
        ));
    }

    #[test]
    fn adjacent_patches_apply() {
        let mut patches = PatchSet::new();
        patches.add(20, PatchValue::PdbAge, "PDB Age");
        patches.add(4, PatchValue::PdbSignature, "PDB Signature");
        patches.add(0, PatchValue::Timestamp, "TimeDateStamp");
        patches.sort();

        let mut image = Image::from_mem(vec![0xEE; 28]).unwrap();
        assert_eq!(patches.apply(&mut image, &values(), false).unwrap(), 3);

        let data = image.data();
        assert_eq!(&data[0..4], &DETERMINISTIC_TIMESTAMP.to_le_bytes());
        assert_eq!(&data[4..20], &[0x11; 16]);
        assert_eq!(&data[20..24], &DETERMINISTIC_PDB_AGE.to_le_bytes());
        assert_eq!(&data[24..28], &[0xEE; 4]);
    }

    #[test]
    fn overlapping_patches_are_rejected_without_writing() {
        let mut patches = PatchSet::new();
        patches.add(0, PatchValue::Timestamp, "first");
        patches.add(4, PatchValue::PdbSignature, "signature");
        patches.add(18, PatchValue::Timestamp, "overlapping");
        patches.sort();

        let mut image = Image::from_mem(vec![0xEE; 32]).unwrap();
        match patches.apply(&mut image, &values(), false) {
            Err(Error::PatchConflict(message)) => {
                assert!(message.contains("overlapping"));
                assert!(message.contains("signature"));
            }
            other => panic!("Expected PatchConflict, got {:?}", other),
        }
        assert_eq!(image.data(), &[0xEE; 32]);
    }

    #[test]
    fn out_of_range_patch_is_rejected() {
        let mut patches = PatchSet::new();
        patches.add(0, PatchValue::Timestamp, "first");
        patches.add(30, PatchValue::Timestamp, "truncated");
        patches.sort();

        let mut image = Image::from_mem(vec![0xEE; 32]).unwrap();
        assert!(matches!(
            patches.apply(&mut image, &values(), false),
            Err(Error::PatchConflict(_))
        ));
        assert_eq!(image.data(), &[0xEE; 32]);
    }

    #[test]
    fn dry_run_validates_without_writing() {
        let mut patches = PatchSet::new();
        patches.add(4, PatchValue::Timestamp, "TimeDateStamp");
        patches.sort();

        let mut image = Image::from_mem(vec![0xEE; 16]).unwrap();
        assert_eq!(patches.apply(&mut image, &values(), true).unwrap(), 1);
        assert_eq!(image.data(), &[0xEE; 16]);
    }

    #[test]
    fn resolve_matches_lengths() {
        let values = values();
        for value in [
            PatchValue::Timestamp,
            PatchValue::PdbSignature,
            PatchValue::PdbAge,
        ] {
            assert_eq!(values.resolve(value).len(), value.size());
        }
    }
}
