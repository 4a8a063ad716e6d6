//! Attachment allocation.
//!
//! Every stored attachment gets the next value of the `Counters.lo_oid` counter as its handle.
//! The incremented counter is committed in its own write session before any bytes are written, so
//! a failed store wastes a handle but never hands the same one out twice. Once the content file
//! exists a `Blob {oid, url}` node records it for observations, diagnoses and messages to link to.

use crate::constants::{ATTACHMENT_COUNTER, COUNTERS_KEY};
use crate::graph::{GraphStore, Label, NodeRef};
use crate::repositories::shared::blob_ref;
use crate::schema::object;
use crate::{ClinicError, ClinicResult};
use clinic_files::{AttachmentFiles, StoredFile};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// A stored attachment as returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoredAttachment {
    pub handle: u64,
    /// `files/<handle><ext>`
    pub url: String,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    pub sha256: String,
}

impl From<StoredFile> for StoredAttachment {
    fn from(file: StoredFile) -> Self {
        Self {
            handle: file.handle,
            url: file.relative_url.into_inner(),
            size_bytes: file.size_bytes,
            media_type: file.media_type.map(|m| m.into_inner()),
            sha256: file.sha256,
        }
    }
}

/// The graph record of an attachment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BlobInfo {
    pub handle: u64,
    pub url: String,
    pub media_type: Option<String>,
}

/// Allocates handles and stores attachment content.
#[derive(Clone, Debug)]
pub struct AttachmentService {
    store: Arc<GraphStore>,
    files: AttachmentFiles,
}

impl AttachmentService {
    pub fn new(store: Arc<GraphStore>, files: AttachmentFiles) -> Self {
        Self { store, files }
    }

    pub fn files(&self) -> &AttachmentFiles {
        &self.files
    }

    /// Stores the file at `source` under a freshly allocated handle.
    ///
    /// The source is read before a handle is allocated, so an unreadable path costs nothing.
    ///
    /// # Errors
    ///
    /// - `ClinicError::InvalidInput` if `source` cannot be read or has no file name
    /// - `ClinicError::Files` if the content file cannot be written
    pub fn save_file(&self, source: &Path) -> ClinicResult<StoredAttachment> {
        let bytes = fs::read(source).map_err(|e| {
            ClinicError::InvalidInput(format!("cannot read {}: {}", source.display(), e))
        })?;
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ClinicError::InvalidInput(format!("{} has no file name", source.display()))
            })?;
        self.save_bytes(name, &bytes)
    }

    /// Stores `bytes` under a freshly allocated handle; `original_name` supplies the extension.
    pub fn save_bytes(&self, original_name: &str, bytes: &[u8]) -> ClinicResult<StoredAttachment> {
        if original_name.trim().is_empty() {
            return Err(ClinicError::InvalidInput(
                "attachment file name must not be empty".into(),
            ));
        }

        let handle = self.allocate_handle()?;
        let stored = self.files.store_bytes(handle, original_name, bytes)?;

        self.store.write(|g| {
            g.create_node(
                Label::Blob,
                &handle.to_string(),
                object(json!({
                    "url": stored.relative_url.as_str(),
                    "media_type": stored.media_type.as_ref().map(|m| m.as_str()),
                })),
            )
        })?;

        tracing::info!(handle, url = %stored.relative_url, size = stored.size_bytes, "saved attachment");
        Ok(stored.into())
    }

    /// The blob record for `handle`.
    pub fn blob(&self, handle: u64) -> ClinicResult<BlobInfo> {
        self.store.read(|g| {
            let node = g.require(&blob_ref(handle))?;
            Ok(BlobInfo {
                handle,
                url: node.str_prop("url").unwrap_or_default().to_owned(),
                media_type: node.str_prop("media_type").map(str::to_owned),
            })
        })
    }

    /// Content of the attachment stored under `handle`.
    pub fn read(&self, handle: u64) -> ClinicResult<Vec<u8>> {
        let blob = self.blob(handle)?;
        let path = self.files.resolve_url(&blob.url)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClinicError::not_found("attachment file", &blob.url)
            } else {
                ClinicError::StoreRead { path, source: e }
            }
        })
    }

    fn allocate_handle(&self) -> ClinicResult<u64> {
        let counters = NodeRef::new(Label::Counters, COUNTERS_KEY);
        self.store.write(|g| {
            if !g.contains(&counters) {
                g.create_node(
                    Label::Counters,
                    COUNTERS_KEY,
                    object(json!({ ATTACHMENT_COUNTER: 0 })),
                )?;
            }
            g.increment_counter(&counters, ATTACHMENT_COUNTER)
        })
    }
}
