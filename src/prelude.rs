//! # pezap Prelude
//!
//! This module provides a convenient prelude for the most commonly used types of the
//! pezap library. Import this module to get quick access to everything needed to patch
//! an image and inspect the result.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pezap operations
pub use crate::Error;

/// The result type used throughout pezap
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Runs a complete patch of an image and its PDB
pub use crate::patcher::{PatchOptions, PatchReport, Patcher, Stage};

/// Deterministic values written into patched fields
pub use crate::patch::{DETERMINISTIC_PDB_AGE, DETERMINISTIC_TIMESTAMP};

// ================================================================================================
// Image Access and Parsing
// ================================================================================================

/// Image access
pub use crate::file::{Image, MapMode};

/// PE structures
pub use crate::pe::{
    DataDirectoryKind, DebugDirectoryEntry, OptionalHeader, OptionalHeaderMagic, PdbMatchRecord,
    PeFile,
};

/// Deferred patches
pub use crate::patch::{Patch, PatchSet, PatchValue, PatchValues};

// ================================================================================================
// PDB
// ================================================================================================

/// PDB container and identity
pub use crate::pdb::{container::PdbStreams, rewrite_pdb, PdbHeaderStream, PdbIdentity, PdbStreamType};
