//! Doctor-patient messaging endpoints.
//!
//! `{other}` is always the id of the doctor or patient on the other side of the conversation;
//! the caller's own side comes from their credentials.

use crate::{ApiError, AppState, AuthSession, ErrorRes};
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use clinic_core::{ConversationOrder, Counterpart, DraftAttachment, MessageDraft, MessageRecord};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConversationQuery {
    /// `oldest_first` (default) or `newest_first`
    pub order: Option<ConversationOrder>,
    /// At most this many messages (default 200, capped at 1000)
    pub limit: Option<usize>,
}

/// A message needs text, an attachment handle from `POST /attachments`, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SendMessageReq {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachment_handle: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageRes {
    pub id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/messages/recipients", get(recipients))
        .route("/messages/:other", get(conversation).post(send))
}

#[utoipa::path(
    get,
    path = "/messages/recipients",
    tag = "messages",
    responses(
        (status = 200, description = "People the caller can message", body = [Counterpart]),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes)
    )
)]
/// Patients of a doctor, or doctors of a patient. Empty for operator-only accounts.
#[axum::debug_handler]
pub async fn recipients(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<Vec<Counterpart>>, ApiError> {
    Ok(Json(state.records.identity().counterparts(&session)?))
}

#[utoipa::path(
    get,
    path = "/messages/{other}",
    tag = "messages",
    params(
        ("other" = String, Path, description = "Doctor or patient id"),
        ConversationQuery
    ),
    responses(
        (status = 200, description = "Messages between the caller and `other`", body = [MessageRecord]),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes)
    )
)]
/// Messages between the caller and `other`
///
/// # Returns
/// * `Ok(Json<Vec<MessageRecord>>)` - The thread in the requested order, empty for operator-only
///   accounts
/// * `Err(ApiError)` - Credentials were rejected or the log could not be read
#[axum::debug_handler]
pub async fn conversation(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    AxumPath(other): AxumPath<String>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<MessageRecord>>, ApiError> {
    let messages = state.records.messaging().conversation(
        &session,
        &other,
        query.order.unwrap_or_default(),
        query.limit,
    )?;
    Ok(Json(messages))
}

#[utoipa::path(
    post,
    path = "/messages/{other}",
    tag = "messages",
    params(("other" = String, Path, description = "Doctor or patient id")),
    request_body = SendMessageReq,
    responses(
        (status = 201, description = "Message appended to the log", body = SendMessageRes),
        (status = 400, description = "Neither text nor attachment", body = ErrorRes),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes),
        (status = 403, description = "Caller is neither a doctor nor a patient", body = ErrorRes),
        (status = 404, description = "Unknown receiver or attachment handle", body = ErrorRes)
    )
)]
/// Sends a message from the caller to `other`.
///
/// # Errors
/// Returns `400 Bad Request` for a message with neither text nor attachment, `403 Forbidden`
/// when the caller is not mapped to a doctor or patient and `404 Not Found` for an unknown
/// receiver or attachment handle.
#[axum::debug_handler]
pub async fn send(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    AxumPath(other): AxumPath<String>,
    Json(req): Json<SendMessageReq>,
) -> Result<(StatusCode, Json<SendMessageRes>), ApiError> {
    let draft = MessageDraft {
        text: req.text,
        attachment: req.attachment_handle.map(DraftAttachment::Stored),
    };
    let id = state.records.messaging().send(&session, &other, draft)?;
    Ok((
        StatusCode::CREATED,
        Json(SendMessageRes { id: id.to_string() }),
    ))
}
