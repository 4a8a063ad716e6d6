//! Caller context.
//!
//! Every operation receives the caller's [`Session`] explicitly; there is no process-wide
//! "current user". Sessions are produced by [`AccountService::login`](crate::AccountService::login)
//! (or built directly in tests and trusted tooling).

use crate::{ClinicError, ClinicResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Role {
    /// `Admin` accounts: may write clinical records.
    Administrator,
    /// `User` accounts: read access plus messaging.
    Standard,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Administrator => f.write_str("administrator"),
            Self::Standard => f.write_str("standard"),
        }
    }
}

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Session {
    pub login_name: String,
    pub role: Role,
}

impl Session {
    pub fn new(login_name: impl Into<String>, role: Role) -> Self {
        Self {
            login_name: login_name.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }

    /// Fails with [`ClinicError::PermissionDenied`] unless this is an administrator session.
    pub fn require_admin(&self) -> ClinicResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ClinicError::PermissionDenied(format!(
                "'{}' is not an administrator; write operations require the administrator role",
                self.login_name
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_admin() {
        assert!(Session::new("admin", Role::Administrator)
            .require_admin()
            .is_ok());

        let err = Session::new("user1", Role::Standard)
            .require_admin()
            .unwrap_err();
        assert!(matches!(err, ClinicError::PermissionDenied(_)));
    }
}
