//! Clinic attachment storage
//!
//! Attachments (scans, photos, documents attached to observations, diagnoses or messages) are
//! stored as plain files in a single content directory. Each file is named after its **handle**,
//! an integer allocated by the caller from a monotonically increasing counter, followed by the
//! original file's extension:
//!
//! ```text
//! <content dir>/
//! ├── 1.pdf
//! ├── 2.png
//! └── 3            # original had no (or an unsafe) extension
//! ```
//!
//! Records elsewhere refer to a file either by its handle or by the relative URL
//! `files/<handle><ext>`. This crate never allocates handles itself and never deletes files;
//! handle allocation and the semantic references belong to the caller.
//!
//! ## Example Usage
//!
//! ```no_run
//! use clinic_files::AttachmentFiles;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let files = AttachmentFiles::open(Path::new("clinic_data/files"))?;
//! let stored = files.store(7, Path::new("/tmp/xray.png"))?;
//! assert_eq!(stored.relative_url.as_str(), "files/7.png");
//! # Ok(())
//! # }
//! ```

mod constants;
mod files;

pub use constants::{FILES_FOLDER_NAME, MAX_EXTENSION_LEN};
pub use files::{safe_extension, stored_name, AttachmentFiles, StoredFile};

/// Errors that can occur during attachment file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Content directory could not be created or is not a directory
    #[error("invalid content directory: {0}")]
    InvalidRootDirectory(String),

    /// Path or URL validation failed (traversal, wrong prefix, unsafe name)
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A file already exists for this handle (handles are never reused)
    #[error("a file already exists for handle {0}")]
    HandleInUse(u64),

    /// No file exists for this handle
    #[error("no file stored for handle {0}")]
    NotFound(u64),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
