//! Constants used throughout the clinic core crate.
//!
//! Defaults for configuration, store file names, and the limits applied to validated input.

/// Default location of the cached graph credentials file.
pub const DEFAULT_CREDENTIALS_FILE: &str = ".clinic/credentials.yaml";

/// Default document store URI (message log).
pub const DEFAULT_DOCUMENT_URI: &str = "file://clinic_data/documents";

/// Default document database name.
pub const DEFAULT_DOCUMENT_DB: &str = "clinic_app";

/// Default attachment content directory.
pub const DEFAULT_FILES_DIR: &str = "clinic_data/files";

/// Default REST bind address.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// URI scheme prefix for file-backed stores.
pub const FILE_URI_PREFIX: &str = "file://";

/// URI for in-memory stores.
pub const MEMORY_URI: &str = "memory:";

/// Name of the message collection inside the document database.
pub const MESSAGES_COLLECTION: &str = "messages";

/// File extension of JSON-lines collections.
pub const COLLECTION_FILE_EXTENSION: &str = "jsonl";

/// Format version written into graph store files.
pub const GRAPH_FILE_FORMAT_VERSION: u32 = 1;

/// Key of the singleton `Counters` node.
pub const COUNTERS_KEY: &str = "global";

/// Counter property holding the last allocated attachment handle.
pub const ATTACHMENT_COUNTER: &str = "lo_oid";

/// Default number of messages returned by a conversation query.
pub const DEFAULT_CONVERSATION_LIMIT: usize = 200;

/// Upper bound on the number of messages returned by a conversation query.
pub const MAX_CONVERSATION_LIMIT: usize = 1000;

/// Smallest accepted year in clinical dates.
pub const MIN_YEAR: i64 = 1900;

/// Largest accepted year in clinical dates.
pub const MAX_YEAR: i64 = 3000;

/// Seeded administrator account (created by `bootstrap --seed`).
pub const DEFAULT_ADMIN_NAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Seeded standard account (created by `bootstrap --seed`).
pub const DEFAULT_USER_NAME: &str = "user1";
pub const DEFAULT_USER_PASSWORD: &str = "user123";

/// Length in bytes of the random salt mixed into password digests.
pub const PASSWORD_SALT_LEN: usize = 16;
