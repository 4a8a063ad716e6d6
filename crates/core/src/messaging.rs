//! Doctor-patient messaging.
//!
//! Only callers that resolve to a doctor or a patient take part. A doctor writes to patients and a
//! patient writes to doctors; a message carries text, an attachment, or both.

use crate::attachments::AttachmentService;
use crate::constants::{DEFAULT_CONVERSATION_LIMIT, MAX_CONVERSATION_LIMIT};
use crate::documents::{participants, MessageEntry, MessageLog, MessageRecord};
use crate::graph::{GraphStore, Label, NodeRef};
use crate::identity::{resolve_in, Identity, PersonKind};
use crate::session::Session;
use crate::{ClinicError, ClinicResult};
use clinic_ids::MessageId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// What to attach to a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DraftAttachment {
    /// A local file, stored under a new handle when the message is sent.
    Path(PathBuf),
    /// An attachment stored earlier.
    Stored(u64),
}

/// A message to send.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageDraft {
    pub text: Option<String>,
    pub attachment: Option<DraftAttachment>,
}

impl MessageDraft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            attachment: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ConversationOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Messaging service.
#[derive(Clone, Debug)]
pub struct MessagingService {
    store: Arc<GraphStore>,
    log: Arc<dyn MessageLog>,
    attachments: AttachmentService,
}

impl MessagingService {
    pub fn new(
        store: Arc<GraphStore>,
        log: Arc<dyn MessageLog>,
        attachments: AttachmentService,
    ) -> Self {
        Self {
            store,
            log,
            attachments,
        }
    }

    /// Sends a message from the caller to `to_person_id`.
    ///
    /// The receiver is checked before an attachment is stored, so a rejected message never
    /// allocates a handle.
    ///
    /// # Errors
    ///
    /// - `ClinicError::InvalidInput` if the draft has neither text nor attachment
    /// - `ClinicError::PermissionDenied` if the caller is neither a doctor nor a patient
    /// - `ClinicError::NotFound` if the receiver or a stored attachment does not exist
    pub fn send(
        &self,
        session: &Session,
        to_person_id: &str,
        draft: MessageDraft,
    ) -> ClinicResult<MessageId> {
        let text = draft
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);
        if text.is_none() && draft.attachment.is_none() {
            return Err(ClinicError::InvalidInput(
                "provide text or attach a file".into(),
            ));
        }

        let to_person_id = to_person_id.trim();
        let (me, receiver_type) = self.store.read(|g| {
            let me = resolve_in(g, session);
            let receiver_type = me.user_type.counterpart().ok_or_else(|| {
                ClinicError::PermissionDenied(
                    "only doctors or patients can send messages".into(),
                )
            })?;
            let label = match receiver_type {
                PersonKind::Doctor => Label::Doctor,
                _ => Label::Patient,
            };
            g.require(&NodeRef::new(label, to_person_id))?;
            Ok((me, receiver_type))
        })?;

        let file_url = match &draft.attachment {
            None => None,
            Some(DraftAttachment::Path(path)) => Some(self.attachments.save_file(path)?.url),
            Some(DraftAttachment::Stored(handle)) => Some(self.attachments.blob(*handle)?.url),
        };

        let record = self.log.append(MessageEntry {
            sender_id: me.person_id,
            sender_type: me.user_type,
            receiver_id: to_person_id.to_owned(),
            receiver_type,
            text,
            file_url,
        })?;

        tracing::info!(
            id = %record.id,
            from = %record.sender_id,
            to = %record.receiver_id,
            attachment = record.file_url.is_some(),
            "message sent"
        );
        Ok(record.id)
    }

    /// Messages between the caller and `other`, capped at `limit` after ordering.
    ///
    /// `limit` defaults to 200 and is clamped to 1000. Callers that are neither doctor nor patient
    /// get an empty list.
    pub fn conversation(
        &self,
        session: &Session,
        other: &str,
        order: ConversationOrder,
        limit: Option<usize>,
    ) -> ClinicResult<Vec<MessageRecord>> {
        let me: Identity = self.store.read(|g| Ok(resolve_in(g, session)))?;
        if !me.is_clinical() {
            return Ok(Vec::new());
        }

        let limit = limit
            .unwrap_or(DEFAULT_CONVERSATION_LIMIT)
            .min(MAX_CONVERSATION_LIMIT);
        let mut records = self.log.conversation(&participants(&me.person_id, other.trim()))?;
        if order == ConversationOrder::NewestFirst {
            records.reverse();
        }
        records.truncate(limit);
        Ok(records)
    }
}
