use std::path::PathBuf;

use thiserror::Error;

macro_rules! invalid_image {
    // Single string version
    ($msg:expr) => {
        crate::Error::InvalidImage {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidImage {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! invalid_pdb {
    // Single string version
    ($msg:expr) => {
        crate::Error::InvalidPdb {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidPdb {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant is fatal for a patch run. Because all modifications of the image are
/// deferred until the very last step, an error returned from any stage means the image on
/// disk is unchanged. The only exception is a failure between committing the rewritten PDB
/// and writing the image patches, which is documented on [`crate::Patcher`].
///
/// # Error Categories
///
/// ## Structural Errors
/// - [`Error::InvalidImage`] - The PE headers are malformed or unsupported
/// - [`Error::InvalidPdb`] - The PDB container is malformed, unsupported or does not match the image
/// - [`Error::OutOfBounds`] - A primitive read went past the end of a buffer
///
/// ## Consistency Errors
/// - [`Error::PatchConflict`] - The recorded patches are out of range, unsorted or overlapping
///
/// ## I/O Errors
/// - [`Error::Io`] - A file operation failed, with the operation and path attached
/// - [`Error::FileError`] - A plain filesystem or mapping error
///
/// # Examples
///
/// ```rust,no_run
/// use pezap::{Error, PatchOptions, Patcher};
/// use std::path::Path;
///
/// let patcher = Patcher::new(PatchOptions::default());
/// match patcher.run(Path::new("app.exe"), Some(Path::new("app.pdb"))) {
///     Ok(report) => println!("Patched {} fields", report.patch_count()),
///     Err(Error::InvalidImage { message, .. }) => eprintln!("Bad image: {}", message),
///     Err(Error::InvalidPdb { message, .. }) => eprintln!("Bad PDB: {}", message),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The PE image is damaged or uses an unsupported layout.
    ///
    /// Raised for bad DOS/PE magic, an optional header magic that is neither PE32 nor
    /// PE32+, multiple CodeView debug entries, and any header pointer that falls outside
    /// of the image.
    #[error("Invalid image - {file}:{line}: {message}")]
    InvalidImage {
        /// The message to be printed for the InvalidImage error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The PDB file is damaged, unsupported, or does not belong to the image.
    ///
    /// Raised for a malformed MSF container, a missing or undersized header stream, an
    /// implementation version older than VC 7.0, and a signature mismatch between the
    /// image and the PDB.
    #[error("Invalid PDB - {file}:{line}: {message}")]
    InvalidPdb {
        /// The message to be printed for the InvalidPdb error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading a buffer.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The patch list violates its ordering or non-overlap invariant.
    ///
    /// This is an internal-consistency error: patches are only ever derived from
    /// distinct header fields, so a conflict means the image contains overlapping
    /// structures that the patcher refuses to write.
    #[error("Patch conflict - {0}")]
    PatchConflict(String),

    /// A file operation failed.
    ///
    /// Carries a description of the operation, the path it was applied to, and the
    /// underlying OS error.
    #[error("{message} '{}': {source}", path.display())]
    Io {
        /// Description of the failed operation
        message: String,
        /// The path the operation was applied to
        path: PathBuf,
        /// The underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that carry no additional context, such as memory
    /// mapping failures.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

impl Error {
    /// Creates an [`Error::Io`] for a failed operation on `path`.
    pub(crate) fn io(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Io {
            message: message.into(),
            path: path.into(),
            source,
        }
    }
}
