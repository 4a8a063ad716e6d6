//! Document store for the message log.
//!
//! Messages live in a `messages` collection separate from the clinical graph. The log is
//! append-only: records are never rewritten or removed. Each record carries the sorted pair of
//! participant ids so a conversation can be fetched from either side.
//!
//! Two backends implement [`MessageLog`]:
//!
//! - [`InMemoryMessageLog`] for tests and `memory:` deployments
//! - [`JsonlMessageLog`], one JSON document per line in `<dir>/<database>/messages.jsonl`

use crate::config::StoreUri;
use crate::constants::{COLLECTION_FILE_EXTENSION, MESSAGES_COLLECTION};
use crate::identity::PersonKind;
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_ids::MessageId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// A message before the log assigns its id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEntry {
    pub sender_id: String,
    pub sender_type: PersonKind,
    pub receiver_id: String,
    pub receiver_type: PersonKind,
    pub text: Option<String>,
    pub file_url: Option<String>,
}

/// A stored message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MessageRecord {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub id: MessageId,
    pub sender_id: String,
    pub sender_type: PersonKind,
    pub receiver_id: String,
    pub receiver_type: PersonKind,
    pub text: Option<String>,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Sender and receiver ids, sorted.
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub participants: [String; 2],
}

impl MessageRecord {
    fn new(id: MessageId, entry: MessageEntry) -> Self {
        let participants = participants(&entry.sender_id, &entry.receiver_id);
        Self {
            created_at: id.timestamp(),
            id,
            sender_id: entry.sender_id,
            sender_type: entry.sender_type,
            receiver_id: entry.receiver_id,
            receiver_type: entry.receiver_type,
            text: entry.text,
            file_url: entry.file_url,
            participants,
        }
    }
}

/// The sorted participant pair of a conversation between `a` and `b`.
pub fn participants(a: &str, b: &str) -> [String; 2] {
    let mut pair = [a.to_owned(), b.to_owned()];
    pair.sort();
    pair
}

/// Append-only message collection.
pub trait MessageLog: Send + Sync + std::fmt::Debug {
    /// Assigns the next time-ordered id to `entry` and stores it.
    fn append(&self, entry: MessageEntry) -> ClinicResult<MessageRecord>;

    /// Every message between the pair, oldest first.
    fn conversation(&self, participants: &[String; 2]) -> ClinicResult<Vec<MessageRecord>>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Opens the `messages` collection of `database` at `uri`.
pub fn open_message_log(uri: &StoreUri, database: &str) -> ClinicResult<Arc<dyn MessageLog>> {
    match uri {
        StoreUri::Memory => Ok(Arc::new(InMemoryMessageLog::default())),
        StoreUri::File(dir) => Ok(Arc::new(JsonlMessageLog::open(&dir.join(database))?)),
    }
}

// ============================================================================
// MEMORY BACKEND
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    records: Mutex<Vec<MessageRecord>>,
}

impl MessageLog for InMemoryMessageLog {
    fn append(&self, entry: MessageEntry) -> ClinicResult<MessageRecord> {
        let mut records = lock(&self.records);
        let record = MessageRecord::new(MessageId::generate(records.last().map(|r| &r.id)), entry);
        records.push(record.clone());
        Ok(record)
    }

    fn conversation(&self, participants: &[String; 2]) -> ClinicResult<Vec<MessageRecord>> {
        Ok(lock(&self.records)
            .iter()
            .filter(|r| &r.participants == participants)
            .cloned()
            .collect())
    }
}

// ============================================================================
// JSON LINES BACKEND
// ============================================================================

/// File-backed collection. The last id is cached at open so new ids keep increasing.
#[derive(Debug)]
pub struct JsonlMessageLog {
    path: PathBuf,
    last_id: Mutex<Option<MessageId>>,
}

impl JsonlMessageLog {
    /// Opens (creating if necessary) the collection file under `database_dir`.
    pub fn open(database_dir: &Path) -> ClinicResult<Self> {
        fs::create_dir_all(database_dir).map_err(|source| ClinicError::StoreWrite {
            path: database_dir.to_path_buf(),
            source,
        })?;
        let path = database_dir
            .join(MESSAGES_COLLECTION)
            .with_extension(COLLECTION_FILE_EXTENSION);

        repair_tail(&path)?;
        let last_id = read_records(&path)?.into_iter().map(|r| r.id).max();
        tracing::debug!(path = %path.display(), last_id = ?last_id.map(|id| id.to_string()), "opened message log");

        Ok(Self {
            path,
            last_id: Mutex::new(last_id),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessageLog for JsonlMessageLog {
    fn append(&self, entry: MessageEntry) -> ClinicResult<MessageRecord> {
        let mut last_id = lock(&self.last_id);
        let record = MessageRecord::new(MessageId::generate(last_id.as_ref()), entry);

        let mut line = serde_json::to_string(&record).map_err(ClinicError::Serialization)?;
        line.push('\n');

        let write_err = |source: std::io::Error| ClinicError::StoreWrite {
            path: self.path.clone(),
            source,
        };
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        let len_before = file.metadata().map_err(write_err)?.len();
        if let Err(source) = file
            .write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
        {
            // A half-written line would swallow the next record.
            if let Err(e) = file.set_len(len_before) {
                tracing::warn!(path = %self.path.display(), error = %e, "could not roll back partial message record");
            }
            return Err(write_err(source));
        }

        *last_id = Some(record.id);
        Ok(record)
    }

    fn conversation(&self, participants: &[String; 2]) -> ClinicResult<Vec<MessageRecord>> {
        let _guard = lock(&self.last_id);
        let mut records: Vec<MessageRecord> = read_records(&self.path)?
            .into_iter()
            .filter(|r| &r.participants == participants)
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

/// Makes sure the file ends on a line boundary before anything is appended.
///
/// A last line without its newline is the remains of an interrupted append. It is completed when
/// it holds a whole record and cut off otherwise.
fn repair_tail(path: &Path) -> ClinicResult<()> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(ClinicError::StoreRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return Ok(());
    }

    let line_start = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i + 1);
    let tail = &bytes[line_start..];

    let write_err = |source: std::io::Error| ClinicError::StoreWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(write_err)?;
    if serde_json::from_slice::<MessageRecord>(tail).is_ok() {
        tracing::info!(path = %path.display(), "terminating last message record");
        file.write_all(b"\n").map_err(write_err)?;
    } else {
        tracing::warn!(path = %path.display(), dropped_bytes = tail.len(), "dropping partial message record");
        file.set_len(line_start as u64).map_err(write_err)?;
    }
    file.sync_data().map_err(write_err)
}

/// Reads every well-formed record; corrupt lines are logged and skipped.
fn read_records(path: &Path) -> ClinicResult<Vec<MessageRecord>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ClinicError::StoreRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| ClinicError::StoreRead {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<MessageRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = index + 1, error = %e, "skipping corrupt message record");
            }
        }
    }
    Ok(records)
}
