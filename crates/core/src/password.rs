//! Salted password digests.
//!
//! Account passwords and the graph store owner's password are never stored in clear. The stored
//! form is `sha256$<salt hex>$<digest hex>` where the digest is `SHA-256(salt || password)`.

use crate::constants::PASSWORD_SALT_LEN;
use crate::{ClinicError, ClinicResult};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

const SCHEME: &str = "sha256";

/// A salted SHA-256 password digest.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    salt: Vec<u8>,
    digest: [u8; 32],
}

impl PasswordDigest {
    /// Hashes `password` with a fresh random salt.
    pub fn new(password: &str) -> Self {
        let mut salt = vec![0u8; PASSWORD_SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = compute(&salt, password);
        Self { salt, digest }
    }

    /// Returns true when `password` hashes to this digest.
    pub fn verify(&self, password: &str) -> bool {
        digests_match(&compute(&self.salt, password), &self.digest)
    }
}

/// Compares every byte regardless of where the first difference is.
fn digests_match(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn compute(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

// Never print the digest itself.
impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDigest(..)")
    }
}

impl fmt::Display for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}${}${}",
            SCHEME,
            hex::encode(&self.salt),
            hex::encode(self.digest)
        )
    }
}

impl FromStr for PasswordDigest {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ClinicError::InvalidInput("malformed password digest".into());

        let mut parts = s.split('$');
        let (Some(scheme), Some(salt), Some(digest), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if scheme != SCHEME {
            return Err(invalid());
        }

        let salt = hex::decode(salt).map_err(|_| invalid())?;
        let digest: [u8; 32] = hex::decode(digest)
            .map_err(|_| invalid())?
            .try_into()
            .map_err(|_| invalid())?;

        Ok(Self { salt, digest })
    }
}

impl serde::Serialize for PasswordDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for PasswordDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses a stored digest and checks `password` against it.
///
/// Fails with `InvalidInput` if the stored value is not a digest.
pub(crate) fn verify_stored(stored: &str, password: &str) -> ClinicResult<bool> {
    Ok(stored.parse::<PasswordDigest>()?.verify(password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_accepts_only_the_original_password() {
        let digest = PasswordDigest::new("user123");

        assert!(digest.verify("user123"));
        assert!(!digest.verify("user124"));
        assert!(!digest.verify(""));
    }

    #[test]
    fn test_digests_match_checks_every_byte() {
        let digest = compute(b"salt", "admin");
        let mut last_differs = digest;
        last_differs[31] ^= 1;
        let mut first_differs = digest;
        first_differs[0] ^= 0x80;

        assert!(digests_match(&digest, &digest));
        assert!(!digests_match(&digest, &last_differs));
        assert!(!digests_match(&digest, &first_differs));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let a = PasswordDigest::new("admin");
        let b = PasswordDigest::new("admin");

        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_display_parses_back() {
        let digest = PasswordDigest::new("secret");
        let stored = digest.to_string();

        assert!(stored.starts_with("sha256$"));
        assert!(!stored.contains("secret"));
        let parsed: PasswordDigest = stored.parse().unwrap();
        assert!(parsed.verify("secret"));
    }

    #[test]
    fn test_parse_rejects_clear_text() {
        assert!("admin".parse::<PasswordDigest>().is_err());
        assert!("md5$00$00".parse::<PasswordDigest>().is_err());
        assert!(verify_stored("admin", "admin").is_err());
    }

    #[test]
    fn test_debug_hides_digest() {
        let digest = PasswordDigest::new("secret");
        assert_eq!(format!("{:?}", digest), "PasswordDigest(..)");
    }
}
