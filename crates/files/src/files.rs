//! Attachment content directory implementation
//!
//! [`AttachmentFiles`] owns one directory and stores each attachment under a deterministic name
//! derived from its handle. Files are immutable: a handle that already has a file is rejected
//! (`FilesError::HandleInUse`), and nothing in this module removes files.
//!
//! # Naming
//!
//! `stored_name(handle, original)` is `<handle><ext>`, where `<ext>` is the original file's final
//! suffix including its dot. The suffix is dropped unless it is at most
//! [`MAX_EXTENSION_LEN`] characters long and made only of ASCII alphanumerics and dots, so the
//! content directory never contains names the operator did not intend.

use crate::{FilesError, FILES_FOLDER_NAME, MAX_EXTENSION_LEN};
use chrono::{DateTime, Utc};
use clinic_types::NonEmptyText;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Metadata for a stored attachment file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    /// Handle the file was stored under
    pub handle: u64,

    /// Name of the file inside the content directory (`<handle><ext>`)
    pub file_name: NonEmptyText,

    /// Reference used by records: `files/<handle><ext>`
    pub relative_url: NonEmptyText,

    /// Original filename supplied by the operator
    pub original_filename: NonEmptyText,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Detected media type (MIME type), best-effort
    pub media_type: Option<NonEmptyText>,

    /// Hex SHA-256 digest of the content
    pub sha256: String,

    /// UTC timestamp when the file was stored
    pub stored_at: DateTime<Utc>,
}

/// Returns the extension kept for a stored file, including the leading dot, or `""`.
pub fn safe_extension(original: &Path) -> String {
    let Some(ext) = original.extension().and_then(|e| e.to_str()) else {
        return String::new();
    };
    let dotted = format!(".{}", ext);

    let allowed = dotted.len() <= MAX_EXTENSION_LEN
        && dotted.chars().all(|c| c.is_ascii_alphanumeric() || c == '.');

    if allowed {
        dotted
    } else {
        String::new()
    }
}

/// Returns the deterministic content-directory name for `handle`.
pub fn stored_name(handle: u64, original: &Path) -> String {
    format!("{}{}", handle, safe_extension(original))
}

/// Service for one attachment content directory.
#[derive(Debug, Clone)]
pub struct AttachmentFiles {
    content_dir: PathBuf,
}

impl AttachmentFiles {
    /// Opens (creating if necessary) the content directory.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if the directory cannot be created, is not a
    /// directory, or cannot be canonicalised.
    pub fn open(content_dir: &Path) -> Result<Self, FilesError> {
        fs::create_dir_all(content_dir).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "cannot create {}: {}",
                content_dir.display(),
                e
            ))
        })?;

        if !content_dir.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "path is not a directory: {}",
                content_dir.display()
            )));
        }

        let content_dir = content_dir.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "cannot canonicalize path {}: {}",
                content_dir.display(),
                e
            ))
        })?;

        Ok(Self { content_dir })
    }

    /// Returns the canonical content directory.
    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Returns the record-facing reference for a stored file name: `files/<name>`.
    pub fn relative_url(file_name: &str) -> String {
        format!("{}/{}", FILES_FOLDER_NAME, file_name)
    }

    /// Reads `source_path` and stores its bytes under `handle`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the source cannot be read, or for any error of
    /// [`store_bytes`](Self::store_bytes).
    pub fn store(&self, handle: u64, source_path: &Path) -> Result<StoredFile, FilesError> {
        let bytes = fs::read(source_path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "failed to read source file {}: {}",
                    source_path.display(),
                    e
                ),
            ))
        })?;

        let original_name = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        self.store_bytes(handle, original_name, &bytes)
    }

    /// Stores `bytes` under `handle`, naming the file after `original_name`'s extension.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidPath`] if `original_name` is blank
    /// - [`FilesError::HandleInUse`] if a file already exists for `handle`
    /// - [`FilesError::Io`] if the file cannot be written
    pub fn store_bytes(
        &self,
        handle: u64,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, FilesError> {
        let original_filename = NonEmptyText::new(original_name)
            .map_err(|_| FilesError::InvalidPath("original file name is empty".into()))?;

        if self.locate(handle)?.is_some() {
            return Err(FilesError::HandleInUse(handle));
        }

        let file_name = stored_name(handle, Path::new(original_filename.as_str()));
        let target = self.content_dir.join(&file_name);

        // create_new refuses to clobber a file that appeared since the check above
        let mut out = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    FilesError::HandleInUse(handle)
                } else {
                    FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!("failed to create {}: {}", target.display(), e),
                    ))
                }
            })?;
        out.write_all(bytes)?;
        out.sync_all()?;

        let sha256 = hex::encode(Sha256::digest(bytes));
        let media_type = infer::get(bytes).and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

        tracing::debug!(handle, file = %file_name, size = bytes.len(), "stored attachment file");

        Ok(StoredFile {
            handle,
            relative_url: NonEmptyText::new(Self::relative_url(&file_name))
                .map_err(|_| FilesError::InvalidPath("empty relative url".into()))?,
            file_name: NonEmptyText::new(&file_name)
                .map_err(|_| FilesError::InvalidPath("empty file name".into()))?,
            original_filename,
            size_bytes: bytes.len() as u64,
            media_type,
            sha256,
            stored_at: Utc::now(),
        })
    }

    /// Finds the stored file for `handle`, if any.
    ///
    /// Matches `<handle>` exactly or `<handle>.<ext>`, so handle `1` never matches `12.pdf`.
    pub fn locate(&self, handle: u64) -> Result<Option<PathBuf>, FilesError> {
        let bare = handle.to_string();
        let dotted = format!("{}.", bare);

        for entry in fs::read_dir(&self.content_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if (name == bare || name.starts_with(&dotted)) && entry.file_type()?.is_file() {
                return Ok(Some(entry.path()));
            }
        }

        Ok(None)
    }

    /// Reads the content stored for `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::NotFound`] if no file exists for `handle`.
    pub fn read(&self, handle: u64) -> Result<Vec<u8>, FilesError> {
        let path = self.locate(handle)?.ok_or(FilesError::NotFound(handle))?;
        Ok(fs::read(path)?)
    }

    /// Maps a `files/<name>` reference to a path inside the content directory.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] if the URL lacks the `files/` prefix or the name could
    /// escape the content directory.
    pub fn resolve_url(&self, url: &str) -> Result<PathBuf, FilesError> {
        let name = url
            .strip_prefix(FILES_FOLDER_NAME)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| FilesError::InvalidPath(format!("not a files/ reference: {}", url)))?;

        let leading_digit = name.chars().next().is_some_and(|c| c.is_ascii_digit());
        let safe_chars = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.');

        if !leading_digit || !safe_chars || name.contains("..") {
            return Err(FilesError::InvalidPath(format!(
                "unsafe attachment name: {}",
                name
            )));
        }

        Ok(self.content_dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, AttachmentFiles) {
        let temp = TempDir::new().unwrap();
        let files = AttachmentFiles::open(&temp.path().join("files")).unwrap();
        (temp, files)
    }

    #[test]
    fn test_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("files");

        let files = AttachmentFiles::open(&dir).unwrap();

        assert!(dir.is_dir());
        assert!(files.content_dir().ends_with("files"));
    }

    #[test]
    fn test_open_rejects_regular_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file.txt");
        fs::write(&path, "not a directory").unwrap();

        let result = AttachmentFiles::open(&path);

        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_safe_extension_rules() {
        assert_eq!(safe_extension(Path::new("scan.pdf")), ".pdf");
        assert_eq!(safe_extension(Path::new("archive.tar.gz")), ".gz");
        assert_eq!(safe_extension(Path::new("README")), "");
        assert_eq!(safe_extension(Path::new(".bashrc")), "");
        assert_eq!(safe_extension(Path::new("x.abcdefghij")), "");
        assert_eq!(safe_extension(Path::new("x.abcdefghi")), ".abcdefghi");
        assert_eq!(safe_extension(Path::new("photo.jp-g")), "");
    }

    #[test]
    fn test_stored_name_prefixes_handle() {
        assert_eq!(stored_name(42, Path::new("/tmp/report.PDF")), "42.PDF");
        assert_eq!(stored_name(7, Path::new("notes")), "7");
    }

    #[test]
    fn test_store_writes_content_and_metadata() {
        let (temp, files) = open_temp();
        let source = temp.path().join("note.txt");
        fs::write(&source, b"Hello, clinic!").unwrap();

        let stored = files.store(1, &source).unwrap();

        assert_eq!(stored.handle, 1);
        assert_eq!(stored.file_name.as_str(), "1.txt");
        assert_eq!(stored.relative_url.as_str(), "files/1.txt");
        assert_eq!(stored.original_filename.as_str(), "note.txt");
        assert_eq!(stored.size_bytes, 14);
        assert_eq!(stored.sha256.len(), 64);
        assert_eq!(
            fs::read(files.content_dir().join("1.txt")).unwrap(),
            b"Hello, clinic!"
        );
    }

    #[test]
    fn test_store_detects_media_type() {
        let (_temp, files) = open_temp();
        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

        let stored = files.store_bytes(3, "xray.png", &png_header).unwrap();

        assert_eq!(
            stored.media_type.as_ref().map(|t| t.as_str()),
            Some("image/png")
        );
    }

    #[test]
    fn test_store_rejects_reused_handle() {
        let (_temp, files) = open_temp();
        files.store_bytes(5, "a.txt", b"first").unwrap();

        let second = files.store_bytes(5, "b.pdf", b"second");

        assert!(matches!(second, Err(FilesError::HandleInUse(5))));
        assert_eq!(files.read(5).unwrap(), b"first");
    }

    #[test]
    fn test_store_missing_source_fails() {
        let (_temp, files) = open_temp();

        let result = files.store(1, Path::new("/non-existent/file.txt"));

        assert!(matches!(result, Err(FilesError::Io(_))));
    }

    #[test]
    fn test_locate_does_not_confuse_prefixes() {
        let (_temp, files) = open_temp();
        files.store_bytes(12, "scan.pdf", b"twelve").unwrap();

        assert!(files.locate(1).unwrap().is_none());
        assert!(files.locate(12).unwrap().is_some());
        assert!(matches!(files.read(1), Err(FilesError::NotFound(1))));
    }

    #[test]
    fn test_read_binary_content() {
        let (_temp, files) = open_temp();
        let binary: Vec<u8> = (0..=255).collect();
        files.store_bytes(9, "blob.bin", &binary).unwrap();

        assert_eq!(files.read(9).unwrap(), binary);
    }

    #[test]
    fn test_resolve_url_inside_content_dir() {
        let (_temp, files) = open_temp();

        let path = files.resolve_url("files/4.png").unwrap();

        assert!(path.starts_with(files.content_dir()));
        assert!(path.ends_with("4.png"));
    }

    #[test]
    fn test_resolve_url_rejects_traversal_and_foreign_prefixes() {
        let (_temp, files) = open_temp();

        assert!(files.resolve_url("files/../secret").is_err());
        assert!(files.resolve_url("files/sub/1.png").is_err());
        assert!(files.resolve_url("other/1.png").is_err());
        assert!(files.resolve_url("files/").is_err());
    }

    #[test]
    fn test_stored_file_serialization() {
        let (_temp, files) = open_temp();
        let stored = files.store_bytes(2, "doc.txt", b"content").unwrap();

        let json = serde_json::to_string(&stored).unwrap();

        assert!(json.contains("\"relative_url\":\"files/2.txt\""));
    }
}
