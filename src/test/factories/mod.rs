//! Builders for synthetic PE images and PDB containers.
//!
//! The images are small but structurally complete: DOS header, PE signature, COFF header,
//! a PE32 or PE32+ optional header and a single `.rdata` section holding the directories.

pub(crate) mod image;
pub(crate) mod pdb;
