//! # API REST
//!
//! REST API for the clinic records manager.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (header credentials, status codes, CORS)
//!
//! Every operation is delegated to [`clinic_core::ClinicRecords`]; this crate only maps requests
//! onto it and maps [`clinic_core::ClinicError`] onto HTTP statuses.

#![warn(rust_2018_idioms)]

pub mod accounts;
pub mod attachments;
pub mod auth;
pub mod entities;
pub mod error;
pub mod health;
pub mod messages;

use axum::Router;
use clinic_core::ClinicRecords;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use auth::{AuthSession, LOGIN_NAME_HEADER, LOGIN_PASSWORD_HEADER};
pub use error::{ApiError, ErrorRes};

/// REST bind address variable.
pub const ENV_REST_ADDR: &str = "CLINIC_REST_ADDR";

/// The configured bind address, `0.0.0.0:3000` when unset.
pub fn rest_addr_from_env() -> String {
    std::env::var(ENV_REST_ADDR).unwrap_or_else(|_| clinic_core::constants::DEFAULT_REST_ADDR.into())
}

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<ClinicRecords>,
}

impl AppState {
    pub fn new(records: ClinicRecords) -> Self {
        Self {
            records: Arc::new(records),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        accounts::me,
        accounts::list_accounts,
        accounts::create_account,
        accounts::register,
        accounts::change_credentials,
        entities::clinics::search,
        entities::clinics::create,
        entities::clinics::update,
        entities::clinics::delete,
        entities::departments::search,
        entities::departments::create,
        entities::departments::update,
        entities::departments::delete,
        entities::doctors::search,
        entities::doctors::create,
        entities::doctors::update,
        entities::doctors::delete,
        entities::patients::search,
        entities::patients::create,
        entities::patients::update,
        entities::patients::delete,
        entities::appointments::search,
        entities::appointments::create,
        entities::appointments::update,
        entities::appointments::delete,
        entities::observations::search,
        entities::observations::create,
        entities::observations::update,
        entities::observations::delete,
        entities::diagnoses::search,
        entities::diagnoses::create,
        entities::diagnoses::update,
        entities::diagnoses::delete,
        attachments::upload,
        attachments::download,
        messages::recipients,
        messages::conversation,
        messages::send,
    ),
    components(schemas(
        health::HealthRes,
        error::ErrorRes,
        accounts::MeRes,
        accounts::RegisterReq,
        accounts::ChangeCredentialsReq,
        messages::SendMessageReq,
        messages::SendMessageRes,
        clinic_core::AccountKind,
        clinic_core::AccountRow,
        clinic_core::NewAccount,
        clinic_core::Identity,
        clinic_core::PersonKind,
        clinic_core::Section,
        clinic_core::Role,
        clinic_core::Session,
        clinic_core::Counterpart,
        clinic_core::MessageRecord,
        clinic_core::ConversationOrder,
        clinic_core::StoredAttachment,
        clinic_core::DateParts,
        clinic_types::EntityId,
        clinic_types::NonEmptyText,
        entities::ClinicRow,
        entities::NewClinic,
        entities::ClinicPatch,
        entities::DepartmentRow,
        entities::NewDepartment,
        entities::DepartmentPatch,
        entities::DoctorRow,
        entities::NewDoctor,
        entities::DoctorPatch,
        entities::PatientRow,
        entities::NewPatient,
        entities::PatientPatch,
        entities::AppointmentRow,
        entities::NewAppointment,
        entities::AppointmentPatch,
        entities::ObservationRow,
        entities::NewObservation,
        entities::ObservationPatch,
        entities::DiagnosisRow,
        entities::NewDiagnosis,
        entities::DiagnosisPatch,
    ))
)]
pub struct ApiDoc;

/// Builds the REST application: every route, Swagger UI and a permissive CORS layer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(accounts::routes())
        .merge(entities::routes())
        .merge(attachments::routes())
        .merge(messages::routes())
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves [`router`] on `addr` until the listener fails.
pub async fn serve(records: ClinicRecords, addr: &str) -> anyhow::Result<()> {
    let app = router(AppState::new(records));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Serving clinic records REST API on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, Response};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// A router over memory stores with the default accounts.
    pub fn app(dir: &TempDir) -> Router {
        let records = ClinicRecords::in_memory(&dir.path().join("files")).unwrap();
        router(AppState::new(records))
    }

    pub fn request(method: &str, uri: &str, login: Option<(&str, &str)>, body: Body) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some((name, password)) = login {
            builder = builder
                .header(LOGIN_NAME_HEADER, name)
                .header(LOGIN_PASSWORD_HEADER, password);
        }
        builder.body(body).unwrap()
    }

    pub fn json_body(value: Value) -> Body {
        Body::from(serde_json::to_vec(&value).unwrap())
    }

    pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone().oneshot(request).await.unwrap()
    }

    pub async fn read_json(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub const ADMIN: Option<(&str, &str)> = Some(("admin", "admin"));
}
