//! Attachment upload and download.

use crate::{ApiError, AppState, AuthSession, ErrorRes};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path as AxumPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use clinic_core::StoredAttachment;
use serde::Deserialize;
use utoipa::IntoParams;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// Original file name; its extension is kept on the stored file.
    pub filename: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/attachments",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/attachments/:handle", get(download))
}

#[utoipa::path(
    post,
    path = "/attachments",
    tag = "attachments",
    params(UploadQuery),
    request_body(content = String, description = "Raw file content", content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Stored under a new handle", body = StoredAttachment),
        (status = 400, description = "Blank file name", body = ErrorRes),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes)
    )
)]
/// Stores the request body under the next attachment handle.
#[axum::debug_handler]
pub async fn upload(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<StoredAttachment>), ApiError> {
    let stored = state
        .records
        .attachments()
        .save_bytes(&query.filename, &body)?;
    tracing::debug!(handle = stored.handle, by = %session.login_name, "uploaded attachment");
    Ok((StatusCode::CREATED, Json(stored)))
}

#[utoipa::path(
    get,
    path = "/attachments/{handle}",
    tag = "attachments",
    params(("handle" = u64, Path, description = "Attachment handle")),
    responses(
        (status = 200, description = "Attachment content", content_type = "application/octet-stream"),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes),
        (status = 404, description = "No attachment with that handle", body = ErrorRes)
    )
)]
/// Returns the stored bytes of an attachment.
///
/// # Errors
/// Returns `404 Not Found` if the handle was never allocated or its file is gone.
#[axum::debug_handler]
pub async fn download(
    State(state): State<AppState>,
    AuthSession(_session): AuthSession,
    AxumPath(handle): AxumPath<u64>,
) -> Result<Response, ApiError> {
    let attachments = state.records.attachments();
    let media_type = attachments
        .blob(handle)?
        .media_type
        .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_owned());
    let content = attachments.read(handle)?;
    Ok(([(header::CONTENT_TYPE, media_type)], content).into_response())
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::{header, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_then_download() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let uploaded = send(
            &app,
            request(
                "POST",
                "/attachments?filename=notes.txt",
                ADMIN,
                Body::from("lab results"),
            ),
        )
        .await;
        assert_eq!(uploaded.status(), StatusCode::CREATED);
        let stored = read_json(uploaded).await;
        assert_eq!(stored["handle"], 1);
        assert_eq!(stored["url"], "files/1.txt");

        let downloaded = send(&app, request("GET", "/attachments/1", ADMIN, Body::empty())).await;
        assert_eq!(downloaded.status(), StatusCode::OK);
        assert!(downloaded.headers().contains_key(header::CONTENT_TYPE));
        let bytes = downloaded.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"lab results");
    }

    #[tokio::test]
    async fn test_handles_increase_per_upload() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        for expected in 1..=3 {
            let response = send(
                &app,
                request("POST", "/attachments?filename=a.pdf", ADMIN, Body::from("x")),
            )
            .await;
            assert_eq!(read_json(response).await["handle"], expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_handle_is_not_found() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let response = send(&app, request("GET", "/attachments/42", ADMIN, Body::empty())).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
