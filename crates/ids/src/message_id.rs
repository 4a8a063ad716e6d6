use crate::{CanonicalUuid, IdError};
use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use std::{fmt, str::FromStr};

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";

/// A time-prefixed message identifier.
///
/// Format: `YYYYMMDDTHHMMSS.mmmZ-<canonical_uuid>`, for example
/// `20260111T143522.045Z-550e8400e29b41d4a716446655440000`.
///
/// Ordering compares the timestamp first and the UUID second, so sorting ids sorts messages
/// chronologically. Timestamps carry millisecond precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId {
    timestamp: DateTime<Utc>,
    uuid: CanonicalUuid,
}

impl MessageId {
    /// Generates a new message id.
    ///
    /// If `last` is provided, the timestamp is guaranteed to be strictly greater than the
    /// timestamp of `last`, advancing by 1 ms past it when the clock has not moved on.
    pub fn generate(last: Option<&MessageId>) -> Self {
        let now = Utc::now().trunc_subsecs(3);

        let timestamp = match last {
            Some(prev) if now <= prev.timestamp => prev.timestamp + Duration::milliseconds(1),
            _ => now,
        };

        Self {
            timestamp,
            uuid: CanonicalUuid::new(),
        }
    }

    /// Returns the timestamp component.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the UUID component.
    pub fn uuid(&self) -> &CanonicalUuid {
        &self.uuid
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Z-{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.uuid
        )
    }
}

impl FromStr for MessageId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts_str, uuid_str) = s
            .split_once('-')
            .ok_or_else(|| IdError::InvalidInput(format!("invalid message id format: '{}'", s)))?;

        let ts_no_z = ts_str.strip_suffix('Z').ok_or_else(|| {
            IdError::InvalidInput(format!("timestamp must end with 'Z': '{}'", ts_str))
        })?;

        let naive = NaiveDateTime::parse_from_str(ts_no_z, TIMESTAMP_FORMAT).map_err(|e| {
            IdError::InvalidInput(format!("invalid timestamp '{}': {}", ts_str, e))
        })?;

        Ok(Self {
            timestamp: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
            uuid: CanonicalUuid::parse(uuid_str)?,
        })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_without_previous() {
        let id = MessageId::generate(None);

        assert!(CanonicalUuid::is_canonical(&id.uuid().to_string()));
        assert_eq!(id.timestamp().timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_generate_is_strictly_increasing_without_sleep() {
        let first = MessageId::generate(None);
        let second = MessageId::generate(Some(&first));
        let third = MessageId::generate(Some(&second));

        assert!(second.timestamp() > first.timestamp());
        assert!(third.timestamp() > second.timestamp());
        assert!(first < second && second < third);
    }

    #[test]
    fn test_generate_steps_past_a_future_previous_id() {
        let future: MessageId = "29991231T235959.998Z-550e8400e29b41d4a716446655440000"
            .parse()
            .unwrap();
        let next = MessageId::generate(Some(&future));

        assert_eq!(
            next.timestamp(),
            future.timestamp() + Duration::milliseconds(1)
        );
    }

    #[test]
    fn test_display_and_parse_agree() {
        let id = MessageId::generate(None);
        let displayed = id.to_string();

        let (ts, uuid) = displayed.split_once('-').unwrap();
        assert!(ts.ends_with('Z'));
        assert!(CanonicalUuid::is_canonical(uuid));

        let parsed: MessageId = displayed.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_rejects_missing_z() {
        let result: Result<MessageId, _> =
            "20260111T143522.045-550e8400e29b41d4a716446655440000".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let id: MessageId = "20260111T143522.045Z-550e8400e29b41d4a716446655440000"
            .parse()
            .unwrap();
        let json = serde_json::to_string(&id).unwrap();

        assert_eq!(
            json,
            "\"20260111T143522.045Z-550e8400e29b41d4a716446655440000\""
        );
        let back: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
