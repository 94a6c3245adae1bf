//! Discovery of the non-deterministic fields of an image.
//!
//! [`collect_patches`] walks the parsed header chain once and records a patch for every
//! field that changes from build to build. The image itself is not touched.

use crate::{
    patch::{PatchSet, PatchValue},
    pe::{
        directory::{
            DataDirectoryKind, SIZEOF_EXPORT_DIRECTORY, SIZEOF_RESOURCE_DIRECTORY,
            TIME_DATE_STAMP_OFFSET,
        },
        OptionalHeader, OptionalHeaderLayout, OptionalHeaderView, PdbMatchRecord, PeFile,
    },
    Result,
};

/// Records every non-deterministic field of `pe` in `patches`.
///
/// The registered fields are:
///
/// - `IMAGE_FILE_HEADER.TimeDateStamp`
/// - `OptionalHeader.CheckSum`
/// - `IMAGE_EXPORT_DIRECTORY.TimeDateStamp`, if there is an export directory
/// - `IMAGE_RESOURCE_DIRECTORY.TimeDateStamp`, if there is a resource directory
/// - every non-zero `IMAGE_DEBUG_DIRECTORY.TimeDateStamp`
/// - the signature and age of the CodeView record, if there is one
///
/// Returns the CodeView record as it was found in the image, before any patching.
///
/// # Errors
/// Returns [`crate::Error::InvalidImage`] if a directory cannot be located inside the image,
/// or the debug directories carry more than one or an unsupported CodeView record.
pub fn collect_patches(pe: &PeFile<'_>, patches: &mut PatchSet) -> Result<Option<PdbMatchRecord>> {
    patches.add(
        pe.timestamp_offset(),
        PatchValue::Timestamp,
        "IMAGE_FILE_HEADER.TimeDateStamp",
    );

    match pe.optional_header() {
        OptionalHeader::Pe32(view) => collect_optional_header(pe, view, patches),
        OptionalHeader::Pe64(view) => collect_optional_header(pe, view, patches),
    }
}

fn collect_optional_header<L: OptionalHeaderLayout>(
    pe: &PeFile<'_>,
    view: &OptionalHeaderView<L>,
    patches: &mut PatchSet,
) -> Result<Option<PdbMatchRecord>> {
    // The checksum is not recomputed; it carries the fixed timestamp instead.
    patches.add(
        view.checksum_offset(),
        PatchValue::Timestamp,
        "OptionalHeader.CheckSum",
    );

    if let Some(entry) = view.data_directory(pe.image(), DataDirectoryKind::Export)? {
        let offset = pe.directory_offset(&entry, SIZEOF_EXPORT_DIRECTORY)?;
        patches.add(
            offset + TIME_DATE_STAMP_OFFSET,
            PatchValue::Timestamp,
            "IMAGE_EXPORT_DIRECTORY.TimeDateStamp",
        );
    }

    if let Some(entry) = view.data_directory(pe.image(), DataDirectoryKind::Resource)? {
        let offset = pe.directory_offset(&entry, SIZEOF_RESOURCE_DIRECTORY)?;
        patches.add(
            offset + TIME_DATE_STAMP_OFFSET,
            PatchValue::Timestamp,
            "IMAGE_RESOURCE_DIRECTORY.TimeDateStamp",
        );
    }

    collect_debug_directories(pe, patches)
}

fn collect_debug_directories(
    pe: &PeFile<'_>,
    patches: &mut PatchSet,
) -> Result<Option<PdbMatchRecord>> {
    for entry in pe.debug_directories()? {
        let entry = entry?;
        if entry.time_date_stamp != 0 {
            patches.add(
                entry.timestamp_offset(),
                PatchValue::Timestamp,
                "IMAGE_DEBUG_DIRECTORY.TimeDateStamp",
            );
        }
    }

    let record = pe.pdb_match_record()?;
    if let Some(record) = &record {
        patches.add(
            record.signature_offset(),
            PatchValue::PdbSignature,
            "PDB Signature",
        );
        patches.add(record.age_offset(), PatchValue::PdbAge, "PDB Age");
    }

    Ok(record)
}
