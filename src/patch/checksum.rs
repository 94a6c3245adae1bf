//! Deterministic image digest that ignores the bytes it will later overwrite.
//!
//! The digest of an image becomes its new PDB signature, and the PDB signature is itself
//! one of the patched fields. To break that cycle, hashing walks the image sequentially
//! and skips every patch region. The result therefore only depends on the bytes that are
//! left untouched by patching, which makes it identical for two builds that differ solely
//! in timestamps and signatures.
//!
//! MD5 is used as a fast, well distributed 128-bit key. Collision resistance is not a
//! security property here.

use md5::{Digest, Md5};

use crate::patch::Patch;

/// Size of the digest in bytes, equal to the size of a PDB 7.0 GUID.
pub const DIGEST_SIZE: usize = 16;

/// Computes the digest of `data`, excluding every patch region.
///
/// `patches` must be sorted by offset, non-overlapping and within `data`; use
/// [`crate::patch::PatchSet::checksum`] to have that validated first.
///
/// # Panics
/// Panics if a patch lies outside of `data` or the patches are not sorted.
///
/// # Examples
///
/// ```rust
/// use pezap::patch::{checksum, PatchSet, PatchValue};
///
/// let mut patches = PatchSet::new();
/// patches.add(4, PatchValue::Timestamp, "TimeDateStamp");
/// patches.sort();
///
/// let a = [1, 2, 3, 4, 0xAA, 0xAA, 0xAA, 0xAA, 9];
/// let b = [1, 2, 3, 4, 0x00, 0x11, 0x22, 0x33, 9];
/// assert_eq!(
///     checksum::compute(&a, patches.patches()),
///     checksum::compute(&b, patches.patches())
/// );
/// ```
#[must_use]
pub fn compute(data: &[u8], patches: &[Patch]) -> [u8; DIGEST_SIZE] {
    let mut hasher = Md5::new();
    let mut pos = 0;

    for patch in patches {
        hasher.update(&data[pos..patch.offset]);
        pos = patch.end();
    }

    hasher.update(&data[pos..]);

    hasher.finalize().into()
}
