//! Identifier utilities for the clinic crates.
//!
//! Two identifier shapes are used:
//!
//! - [`CanonicalUuid`]: a UUID in canonical form, **32 lowercase hexadecimal characters** with no
//!   hyphens (the value of `Uuid::new_v4().simple().to_string()`). Externally supplied values must
//!   already be canonical; other spellings are rejected rather than normalised.
//! - [`MessageId`]: a time-prefixed identifier for message log entries,
//!   `YYYYMMDDTHHMMSS.mmmZ-<canonical uuid>`. Ids generated from the previous id of the same log
//!   are strictly increasing, which gives the log a stable chronological order even when the
//!   wall clock stalls or steps backwards.

mod canonical;
mod message_id;

pub use canonical::{CanonicalUuid, Uuid};
pub use message_id::MessageId;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("invalid identifier: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
