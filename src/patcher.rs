//! End-to-end patching of an image and its PDB.
//!
//! [`Patcher`] ties the other modules together. A run moves through a fixed sequence of
//! [`Stage`]s and never goes back:
//!
//! ```text
//! Mapped -> HeadersParsed -> PatchesCollected -> ChecksumComputed -> PdbVerified -> Applied
//! ```
//!
//! Any error aborts the run before the image is written. The PDB is committed before the
//! image is patched; should the process die between the two, the PDB carries the new
//! identity while the image still carries the old one, and the run has to be repeated
//! from a fresh build.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pezap::{PatchOptions, Patcher};
//! use std::path::Path;
//!
//! let patcher = Patcher::new(PatchOptions::dry_run());
//! let report = patcher.run(Path::new("app.dll"), Some(Path::new("app.pdb")))?;
//!
//! for label in report.labels() {
//!     println!("would patch {}", label);
//! }
//! println!("signature {}", report.signature());
//! # Ok::<(), pezap::Error>(())
//! ```

use std::path::Path;

use strum::Display;
use uguid::Guid;

use crate::{
    file::{Image, MapMode},
    patch::{Patch, PatchSet, PatchValues},
    pdb::{rewrite_pdb, PdbHeaderStream, PdbIdentity},
    pe::{collect::collect_patches, PeFile},
    Result,
};

/// The stages of a patch run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Stage {
    /// The image is loaded
    #[strum(to_string = "mapped")]
    Mapped,
    /// The PE header chain has been parsed
    #[strum(to_string = "headers parsed")]
    HeadersParsed,
    /// All non-deterministic fields have been recorded and sorted
    #[strum(to_string = "patches collected")]
    PatchesCollected,
    /// The digest over the unpatched bytes is known
    #[strum(to_string = "checksum computed")]
    ChecksumComputed,
    /// The PDB, if any, has been verified and rewritten
    #[strum(to_string = "PDB verified")]
    PdbVerified,
    /// The patches have been written to the image
    #[strum(to_string = "applied")]
    Applied,
}

/// Options for a [`Patcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchOptions {
    /// Run every check but modify neither the image nor the PDB
    pub dry_run: bool,
}

impl PatchOptions {
    /// Options for a run that patches the files.
    #[must_use]
    pub fn new() -> Self {
        PatchOptions::default()
    }

    /// Options for a run that only reports what would be patched.
    #[must_use]
    pub fn dry_run() -> Self {
        PatchOptions { dry_run: true }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    stage: Stage,
    patches: Vec<Patch>,
    signature: Guid,
    pdb_header: Option<PdbHeaderStream>,
    dry_run: bool,
}

impl PatchReport {
    /// The last stage the run reached; [`Stage::Applied`] for every returned report.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Number of patched fields.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }

    /// The patched fields in file order.
    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Names of the patched fields in file order.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.patches.iter().map(|patch| patch.label)
    }

    /// The deterministic PDB signature derived from the image contents.
    #[must_use]
    pub fn signature(&self) -> Guid {
        self.signature
    }

    /// The PDB header as it was before the rewrite, if a PDB was processed.
    #[must_use]
    pub fn pdb_header(&self) -> Option<&PdbHeaderStream> {
        self.pdb_header.as_ref()
    }

    /// Returns `true` if a PDB was rewritten (or, in a dry run, would have been).
    #[must_use]
    pub fn pdb_rewritten(&self) -> bool {
        self.pdb_header.is_some()
    }

    /// Returns `true` if this was a dry run.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

struct Progress {
    stage: Stage,
}

impl Progress {
    fn new() -> Self {
        log::debug!("stage: {}", Stage::Mapped);
        Progress {
            stage: Stage::Mapped,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "stage {} after {}", next, self.stage);
        self.stage = next;
        log::debug!("stage: {}", next);
    }
}

/// Neutralizes the non-deterministic fields of an image and its PDB.
#[derive(Debug, Clone, Default)]
pub struct Patcher {
    options: PatchOptions,
}

impl Patcher {
    /// Creates a patcher with the given options.
    #[must_use]
    pub fn new(options: PatchOptions) -> Self {
        Patcher { options }
    }

    /// The options of this patcher.
    #[must_use]
    pub fn options(&self) -> &PatchOptions {
        &self.options
    }

    /// Patches the image at `image_path` in place and rewrites `pdb_path`, if given.
    ///
    /// The image is mapped read-write, or copy-on-write for a dry run, and flushed after
    /// the patches have been applied. Its length never changes.
    ///
    /// # Errors
    /// Returns the first error of any stage. Unless the failure happens after the PDB has
    /// been committed, neither file is modified.
    pub fn run(&self, image_path: &Path, pdb_path: Option<&Path>) -> Result<PatchReport> {
        let mode = if self.options.dry_run {
            MapMode::CopyOnWrite
        } else {
            MapMode::ReadWrite
        };

        let mut image = Image::open(image_path, mode)?;
        let report = self.run_on_image(&mut image, pdb_path)?;
        image.flush()?;

        Ok(report)
    }

    /// Patches an already loaded image and rewrites `pdb_path`, if given.
    ///
    /// # Errors
    /// - [`crate::Error::InvalidImage`] if the image cannot be parsed
    /// - [`crate::Error::InvalidPdb`] if the PDB is malformed or does not belong to the image
    /// - [`crate::Error::PatchConflict`] if the image's structures overlap
    /// - [`crate::Error::Io`] if the PDB cannot be read or replaced
    pub fn run_on_image(&self, image: &mut Image, pdb_path: Option<&Path>) -> Result<PatchReport> {
        let dry_run = self.options.dry_run;
        let mut progress = Progress::new();

        let (patches, record) = {
            let pe = PeFile::parse(image)?;
            progress.advance(Stage::HeadersParsed);

            let mut patches = PatchSet::new();
            let record = collect_patches(&pe, &mut patches)?;
            patches.sort();
            progress.advance(Stage::PatchesCollected);

            (patches, record)
        };

        let values = PatchValues::new(patches.checksum(image.data())?);
        progress.advance(Stage::ChecksumComputed);

        let pdb_header = match pdb_path {
            Some(pdb_path) => Some(rewrite_pdb(
                pdb_path,
                record.as_ref(),
                &PdbIdentity::from(&values),
                dry_run,
            )?),
            None => None,
        };
        progress.advance(Stage::PdbVerified);

        patches.apply(image, &values, dry_run)?;
        progress.advance(Stage::Applied);

        Ok(PatchReport {
            stage: progress.stage,
            patches: patches.patches().to_vec(),
            signature: values.pdb_signature,
            pdb_header,
            dry_run,
        })
    }
}
