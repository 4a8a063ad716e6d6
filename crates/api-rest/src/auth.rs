//! Header credentials.
//!
//! Every authenticated request carries the account's login name and password in the
//! `x-login-name` and `x-login-password` headers. They are checked on each request; the server
//! keeps no sessions of its own.

use crate::{ApiError, AppState};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use clinic_core::{ClinicError, Session};

pub const LOGIN_NAME_HEADER: &str = "x-login-name";
pub const LOGIN_PASSWORD_HEADER: &str = "x-login-password";

/// The session of an authenticated caller.
///
/// Missing headers are rejected the same way as a wrong password.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let name = header(parts, LOGIN_NAME_HEADER)?;
        let password = header(parts, LOGIN_PASSWORD_HEADER)?;
        let session = state.records.accounts().login(name, password)?;
        tracing::debug!(login = %session.login_name, role = %session.role, "authenticated request");
        Ok(Self(session))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError(ClinicError::InvalidCredentials))
}
