//! Clinical entity endpoints.
//!
//! Every entity gets the same four routes:
//!
//! | Method   | Path                | Operation                                  |
//! |----------|---------------------|--------------------------------------------|
//! | `GET`    | `/{entity}`         | list, or search when filters are given     |
//! | `POST`   | `/{entity}`         | create                                     |
//! | `PATCH`  | `/{entity}/{id}`    | update the fields set in the body          |
//! | `DELETE` | `/{entity}/{id}`    | delete with its relationships              |
//!
//! Patients cannot open entity sections at all; writes additionally need the administrator role,
//! which the repositories enforce.

use crate::{ApiError, AppState, AuthSession, ErrorRes};
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, patch};
use axum::Router;
use clinic_core::{ClinicError, Section, Session};
use clinic_types::EntityId;

pub use clinic_core::repositories::appointment::{
    AppointmentFilter, AppointmentPatch, AppointmentRow, NewAppointment,
};
pub use clinic_core::repositories::clinic::{ClinicFilter, ClinicPatch, ClinicRow, NewClinic};
pub use clinic_core::repositories::department::{
    DepartmentFilter, DepartmentPatch, DepartmentRow, NewDepartment,
};
pub use clinic_core::repositories::diagnosis::{
    DiagnosisFilter, DiagnosisPatch, DiagnosisRow, NewDiagnosis,
};
pub use clinic_core::repositories::doctor::{DoctorFilter, DoctorPatch, DoctorRow, NewDoctor};
pub use clinic_core::repositories::observation::{
    NewObservation, ObservationFilter, ObservationPatch, ObservationRow,
};
pub use clinic_core::repositories::patient::{NewPatient, PatientFilter, PatientPatch, PatientRow};

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(clinics::routes())
        .merge(departments::routes())
        .merge(doctors::routes())
        .merge(patients::routes())
        .merge(appointments::routes())
        .merge(observations::routes())
        .merge(diagnoses::routes())
}

/// Fails with 403 unless the caller's identity may open `section`.
fn open_section(state: &AppState, session: &Session, section: Section) -> Result<(), ApiError> {
    let identity = state.records.identity().resolve(session)?;
    if identity.can_open(section) {
        Ok(())
    } else {
        Err(ClinicError::PermissionDenied(format!(
            "'{}' cannot open {:?}",
            session.login_name, section
        ))
        .into())
    }
}

macro_rules! entity_routes {
    (
        $module:ident,
        tag = $tag:tt,
        section = $section:ident,
        repo = $repo:ident,
        collection = $collection:tt,
        item = $item:tt,
        row = $row:ident,
        new = $new:ident,
        patch = $patch:ident,
        filter = $filter:ident $(,)?
    ) => {
        pub mod $module {
            use super::*;

            pub fn routes() -> Router<AppState> {
                Router::new()
                    .route($collection, get(search).post(create))
                    .route(concat!($collection, "/:id"), patch(update).delete(delete))
            }

            #[utoipa::path(
                get,
                path = $collection,
                tag = $tag,
                operation_id = concat!("search_", stringify!($module)),
                params($filter),
                responses(
                    (status = 200, description = "Matching records", body = [$row]),
                    (status = 401, description = "Missing or invalid credentials", body = ErrorRes),
                    (status = 403, description = "Section not available to the caller", body = ErrorRes)
                )
            )]
            /// Lists records; filters narrow the result.
            #[axum::debug_handler]
            pub async fn search(
                State(state): State<AppState>,
                AuthSession(session): AuthSession,
                Query(filter): Query<$filter>,
            ) -> Result<Json<Vec<$row>>, ApiError> {
                open_section(&state, &session, Section::$section)?;
                Ok(Json(state.records.$repo().search(&filter)?))
            }

            #[utoipa::path(
                post,
                path = $collection,
                tag = $tag,
                operation_id = concat!("create_", stringify!($module)),
                request_body = $new,
                responses(
                    (status = 201, description = "Record created"),
                    (status = 400, description = "Invalid field values", body = ErrorRes),
                    (status = 401, description = "Missing or invalid credentials", body = ErrorRes),
                    (status = 403, description = "Caller may not write records", body = ErrorRes),
                    (status = 404, description = "A referenced record does not exist", body = ErrorRes),
                    (status = 409, description = "Id already in use", body = ErrorRes)
                )
            )]
            /// Creates a record and its relationships in one write.
            ///
            /// # Returns
            /// * `Ok(StatusCode::CREATED)` - The record was stored
            /// * `Err(ApiError)` - Nothing was stored
            ///
            /// # Errors
            /// Returns `400 Bad Request` for invalid fields, `403 Forbidden` for callers without the
            /// administrator role, `404 Not Found` when a referenced record is missing and
            /// `409 Conflict` when the id is taken.
            #[axum::debug_handler]
            pub async fn create(
                State(state): State<AppState>,
                AuthSession(session): AuthSession,
                Json(req): Json<$new>,
            ) -> Result<StatusCode, ApiError> {
                open_section(&state, &session, Section::$section)?;
                state.records.$repo().create(&session, req)?;
                Ok(StatusCode::CREATED)
            }

            #[utoipa::path(
                patch,
                path = $item,
                tag = $tag,
                operation_id = concat!("update_", stringify!($module)),
                params(("id" = String, Path, description = "Record id")),
                request_body = $patch,
                responses(
                    (status = 204, description = "Record updated"),
                    (status = 400, description = "Invalid field values", body = ErrorRes),
                    (status = 401, description = "Missing or invalid credentials", body = ErrorRes),
                    (status = 403, description = "Caller may not write records", body = ErrorRes),
                    (status = 404, description = "No such record", body = ErrorRes)
                )
            )]
            /// Applies a partial update; unset fields are left unchanged.
            ///
            /// # Errors
            /// Returns `404 Not Found` if the record or a newly referenced record does not exist.
            /// Non-administrators get `403 Forbidden` and the record is left as it was.
            #[axum::debug_handler]
            pub async fn update(
                State(state): State<AppState>,
                AuthSession(session): AuthSession,
                AxumPath(id): AxumPath<String>,
                Json(req): Json<$patch>,
            ) -> Result<StatusCode, ApiError> {
                open_section(&state, &session, Section::$section)?;
                let id = EntityId::new(&id)?;
                state.records.$repo().update(&session, &id, req)?;
                Ok(StatusCode::NO_CONTENT)
            }

            #[utoipa::path(
                delete,
                path = $item,
                tag = $tag,
                operation_id = concat!("delete_", stringify!($module)),
                params(("id" = String, Path, description = "Record id")),
                responses(
                    (status = 204, description = "Record and its relationships deleted"),
                    (status = 401, description = "Missing or invalid credentials", body = ErrorRes),
                    (status = 403, description = "Caller may not write records", body = ErrorRes),
                    (status = 404, description = "No such record", body = ErrorRes)
                )
            )]
            /// Deletes the record together with its relationships.
            ///
            /// # Errors
            /// Returns `403 Forbidden` for non-administrators and `404 Not Found` for unknown ids.
            #[axum::debug_handler]
            pub async fn delete(
                State(state): State<AppState>,
                AuthSession(session): AuthSession,
                AxumPath(id): AxumPath<String>,
            ) -> Result<StatusCode, ApiError> {
                open_section(&state, &session, Section::$section)?;
                let id = EntityId::new(&id)?;
                state.records.$repo().delete(&session, &id)?;
                Ok(StatusCode::NO_CONTENT)
            }
        }
    };
}

entity_routes!(
    clinics,
    tag = "clinics",
    section = Clinics,
    repo = clinics,
    collection = "/clinics",
    item = "/clinics/{id}",
    row = ClinicRow,
    new = NewClinic,
    patch = ClinicPatch,
    filter = ClinicFilter,
);

entity_routes!(
    departments,
    tag = "departments",
    section = Departments,
    repo = departments,
    collection = "/departments",
    item = "/departments/{id}",
    row = DepartmentRow,
    new = NewDepartment,
    patch = DepartmentPatch,
    filter = DepartmentFilter,
);

entity_routes!(
    doctors,
    tag = "doctors",
    section = Doctors,
    repo = doctors,
    collection = "/doctors",
    item = "/doctors/{id}",
    row = DoctorRow,
    new = NewDoctor,
    patch = DoctorPatch,
    filter = DoctorFilter,
);

entity_routes!(
    patients,
    tag = "patients",
    section = Patients,
    repo = patients,
    collection = "/patients",
    item = "/patients/{id}",
    row = PatientRow,
    new = NewPatient,
    patch = PatientPatch,
    filter = PatientFilter,
);

entity_routes!(
    appointments,
    tag = "appointments",
    section = Appointments,
    repo = appointments,
    collection = "/appointments",
    item = "/appointments/{id}",
    row = AppointmentRow,
    new = NewAppointment,
    patch = AppointmentPatch,
    filter = AppointmentFilter,
);

entity_routes!(
    observations,
    tag = "observations",
    section = Observations,
    repo = observations,
    collection = "/observations",
    item = "/observations/{id}",
    row = ObservationRow,
    new = NewObservation,
    patch = ObservationPatch,
    filter = ObservationFilter,
);

entity_routes!(
    diagnoses,
    tag = "diagnoses",
    section = Diagnoses,
    repo = diagnoses,
    collection = "/diagnoses",
    item = "/diagnoses/{id}",
    row = DiagnosisRow,
    new = NewDiagnosis,
    patch = DiagnosisPatch,
    filter = DiagnosisFilter,
);

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_search_update_delete_doctor() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let created = send(
            &app,
            request(
                "POST",
                "/doctors",
                ADMIN,
                json_body(json!({"doctor_id": "D1", "name": "Dr Ada"})),
            ),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let duplicate = send(
            &app,
            request(
                "POST",
                "/doctors",
                ADMIN,
                json_body(json!({"doctor_id": "D1", "name": "Dr Other"})),
            ),
        )
        .await;
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let updated = send(
            &app,
            request(
                "PATCH",
                "/doctors/D1",
                ADMIN,
                json_body(json!({"name": "Dr Ada Lovelace"})),
            ),
        )
        .await;
        assert_eq!(updated.status(), StatusCode::NO_CONTENT);

        let found = send(
            &app,
            request("GET", "/doctors?name=Lovelace", ADMIN, Body::empty()),
        )
        .await;
        assert_eq!(found.status(), StatusCode::OK);
        let rows = read_json(found).await;
        assert_eq!(rows.as_array().unwrap().len(), 1);
        assert_eq!(rows[0]["doctor_id"], "D1");

        let deleted = send(&app, request("DELETE", "/doctors/D1", ADMIN, Body::empty())).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let missing = send(&app, request("DELETE", "/doctors/D1", ADMIN, Body::empty())).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_standard_account_reads_but_cannot_write() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let user = Some(("user1", "user123"));

        let listed = send(&app, request("GET", "/clinics", user, Body::empty())).await;
        assert_eq!(listed.status(), StatusCode::OK);

        let denied = send(
            &app,
            request(
                "POST",
                "/clinics",
                user,
                json_body(json!({"cli_id": "C1", "cli_name": "North"})),
            ),
        )
        .await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_patient_cannot_open_entity_sections() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        send(
            &app,
            request(
                "POST",
                "/patients",
                ADMIN,
                json_body(json!({"patient_id": "pia", "name": "Pia"})),
            ),
        )
        .await;
        let account = send(
            &app,
            request(
                "POST",
                "/accounts",
                ADMIN,
                json_body(
                    json!({"kind": "user", "name": "pia", "password": "pw", "person_id": "pia"}),
                ),
            ),
        )
        .await;
        assert_eq!(account.status(), StatusCode::CREATED);

        let response = send(
            &app,
            request("GET", "/patients", Some(("pia", "pw")), Body::empty()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_blank_required_field_is_rejected() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let response = send(
            &app,
            request(
                "POST",
                "/clinics",
                ADMIN,
                json_body(json!({"cli_id": "C1", "cli_name": "   "})),
            ),
        )
        .await;

        assert!(response.status().is_client_error());
    }
}
