//! Mapping of core errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use clinic_core::ClinicError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

/// A failed request.
#[derive(Debug)]
pub struct ApiError(pub ClinicError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ClinicError::InvalidInput(_) | ClinicError::Text(_) => StatusCode::BAD_REQUEST,
            ClinicError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ClinicError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ClinicError::NotFound(_) => StatusCode::NOT_FOUND,
            ClinicError::AlreadyExists(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        Self(err)
    }
}

impl From<clinic_types::TextError> for ApiError {
    fn from(err: clinic_types::TextError) -> Self {
        Self(ClinicError::Text(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self.0);
            "Internal error".to_owned()
        } else {
            self.0.to_string()
        };
        (status, Json(ErrorRes { error })).into_response()
    }
}
