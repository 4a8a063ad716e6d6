//! Identity and account endpoints.

use crate::{ApiError, AppState, AuthSession, ErrorRes};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, patch, post};
use axum::Router;
use clinic_core::{AccountRow, Identity, NewAccount, Section, Session};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The caller as resolved from their credentials.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeRes {
    pub identity: Identity,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterReq {
    pub name: String,
    pub password: String,
    pub confirm: String,
}

/// Unset or blank fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChangeCredentialsReq {
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/register", post(register))
        .route("/accounts/me", patch(change_credentials))
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "accounts",
    responses(
        (status = 200, description = "Resolved identity and available sections", body = MeRes),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes)
    )
)]
/// Resolves the caller to a doctor, a patient or an operator-only account.
#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<MeRes>, ApiError> {
    let identity = state.records.identity().resolve(&session)?;
    let sections = identity.sections();
    Ok(Json(MeRes { identity, sections }))
}

#[utoipa::path(
    get,
    path = "/accounts",
    tag = "accounts",
    responses(
        (status = 200, description = "All login accounts", body = [AccountRow]),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes),
        (status = 403, description = "Caller is not an administrator", body = ErrorRes)
    )
)]
/// List every login account
///
/// Rows carry the account kind, login name and mapped person; password digests are never
/// returned.
///
/// # Returns
/// * `Ok(Json<Vec<AccountRow>>)` - Administrator accounts first, then standard ones
/// * `Err(ApiError)` - The caller could not be authorised
///
/// # Errors
/// Returns `401 Unauthorized` for missing or wrong credentials and `403 Forbidden` if the caller
/// is not an administrator.
#[axum::debug_handler]
pub async fn list_accounts(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<Vec<AccountRow>>, ApiError> {
    Ok(Json(state.records.accounts().list(&session)?))
}

#[utoipa::path(
    post,
    path = "/accounts",
    tag = "accounts",
    request_body = NewAccount,
    responses(
        (status = 201, description = "Account created"),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes),
        (status = 403, description = "Caller is not an administrator", body = ErrorRes),
        (status = 409, description = "Login name taken", body = ErrorRes)
    )
)]
/// Creates an account; `person_id` maps it to a doctor or patient.
///
/// # Errors
/// Returns `403 Forbidden` unless the caller is an administrator, and `409 Conflict` if the
/// login name is taken.
#[axum::debug_handler]
pub async fn create_account(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(req): Json<NewAccount>,
) -> Result<StatusCode, ApiError> {
    state.records.accounts().create_account(&session, req)?;
    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    post,
    path = "/accounts/register",
    tag = "accounts",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Standard account registered"),
        (status = 400, description = "Blank fields or mismatched confirmation", body = ErrorRes),
        (status = 409, description = "Login name taken or reserved for a doctor or patient", body = ErrorRes)
    )
)]
/// Self-registration of a standard account; needs no credentials.
///
/// The new account maps to a person with the same id as its name.
///
/// # Returns
/// * `Ok(StatusCode::CREATED)` - The account can log in straight away
/// * `Err(ApiError)` - No account was created
///
/// # Errors
/// Returns `400 Bad Request` if a field is blank or the passwords differ, and `409 Conflict` if
/// the name is taken or is the id of an existing doctor or patient.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> Result<StatusCode, ApiError> {
    state
        .records
        .accounts()
        .register_user(&req.name, &req.password, &req.confirm)?;
    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    patch,
    path = "/accounts/me",
    tag = "accounts",
    request_body = ChangeCredentialsReq,
    responses(
        (status = 200, description = "Session to use from now on", body = Session),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes),
        (status = 409, description = "Login name taken", body = ErrorRes)
    )
)]
/// Changes the caller's own login name and/or password.
///
/// Later requests must send the returned login name and the new password.
#[axum::debug_handler]
pub async fn change_credentials(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(req): Json<ChangeCredentialsReq>,
) -> Result<Json<Session>, ApiError> {
    let session = state.records.accounts().change_own_credentials(
        &session,
        req.new_name.as_deref(),
        req.new_password.as_deref(),
    )?;
    Ok(Json(session))
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_me_requires_credentials() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let missing = send(&app, request("GET", "/me", None, Body::empty())).await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = send(
            &app,
            request("GET", "/me", Some(("admin", "nope")), Body::empty()),
        )
        .await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_resolves_operator_account() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let response = send(&app, request("GET", "/me", ADMIN, Body::empty())).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["identity"]["user_type"], "admin_only");
        assert_eq!(body["identity"]["person_id"], "admin");
        assert_eq!(body["sections"].as_array().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_register_then_list_requires_admin() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let created = send(
            &app,
            request(
                "POST",
                "/accounts/register",
                None,
                json_body(json!({"name": "pia", "password": "pw", "confirm": "pw"})),
            ),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let denied = send(
            &app,
            request("GET", "/accounts", Some(("pia", "pw")), Body::empty()),
        )
        .await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let listed = send(&app, request("GET", "/accounts", ADMIN, Body::empty())).await;
        assert_eq!(listed.status(), StatusCode::OK);
        let names: Vec<String> = read_json(listed)
            .await
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["name"].as_str().unwrap().to_owned())
            .collect();
        assert!(names.contains(&"pia".to_owned()));
    }

    #[tokio::test]
    async fn test_register_with_taken_name_conflicts() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let response = send(
            &app,
            request(
                "POST",
                "/accounts/register",
                None,
                json_body(json!({"name": "admin", "password": "pw", "confirm": "pw"})),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_register_with_patient_id_conflicts() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let patient = send(
            &app,
            request(
                "POST",
                "/patients",
                ADMIN,
                json_body(json!({"patient_id": "P1", "name": "Pia"})),
            ),
        )
        .await;
        assert_eq!(patient.status(), StatusCode::CREATED);

        let response = send(
            &app,
            request(
                "POST",
                "/accounts/register",
                None,
                json_body(json!({"name": "P1", "password": "x", "confirm": "x"})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let stranger = send(
            &app,
            request("GET", "/messages/recipients", Some(("P1", "x")), Body::empty()),
        )
        .await;
        assert_eq!(stranger.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_change_own_credentials() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let response = send(
            &app,
            request(
                "PATCH",
                "/accounts/me",
                ADMIN,
                json_body(json!({"new_name": "chief", "new_password": "s3cret"})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["login_name"], "chief");

        let old = send(&app, request("GET", "/me", ADMIN, Body::empty())).await;
        assert_eq!(old.status(), StatusCode::UNAUTHORIZED);
        let new = send(
            &app,
            request("GET", "/me", Some(("chief", "s3cret")), Body::empty()),
        )
        .await;
        assert_eq!(new.status(), StatusCode::OK);
    }
}
