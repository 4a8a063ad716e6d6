//! Diagnoses made from an observation, optionally with an attached file.

use crate::graph::{GraphStore, Label, NodeRef, RelType};
use crate::repositories::shared::{
    blob_target, contains, equals, file_handle, link_target, missing, optional_text, relink,
    DateFields,
};
use crate::session::Session;
use crate::validation::{validate_date_parts, DateParts};
use crate::ClinicResult;
use clinic_types::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::sync::Arc;

const DATE: DateFields = DateFields {
    year: "diagn_year",
    month: "diagn_month",
    day: "diagn_day",
};
const DATE_LABEL: &str = "diagnosis date";
const COMMENT: &str = "diagn_comment_text";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DiagnosisRow {
    pub diagn_id: String,
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub day: Option<i64>,
    pub obser_id: Option<String>,
    pub appoint_id: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
    pub comment: Option<String>,
    pub file_handle: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewDiagnosis {
    pub diagn_id: EntityId,
    #[serde(default)]
    pub date: DateParts,
    #[serde(default)]
    pub obser_id: Option<EntityId>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub file_handle: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DiagnosisPatch {
    #[serde(default)]
    pub date: DateParts,
    #[serde(default)]
    pub obser_id: Option<EntityId>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub file_handle: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct DiagnosisFilter {
    pub diagn_id: Option<String>,
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub day: Option<i64>,
    pub obser_id: Option<String>,
    pub appoint_id: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
    pub comment: Option<String>,
}

/// Diagnosis repository.
#[derive(Clone, Debug)]
pub struct DiagnosisRepository {
    store: Arc<GraphStore>,
}

impl DiagnosisRepository {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> ClinicResult<Vec<DiagnosisRow>> {
        self.search(&DiagnosisFilter::default())
    }

    pub fn search(&self, filter: &DiagnosisFilter) -> ClinicResult<Vec<DiagnosisRow>> {
        self.store.read(|g| {
            Ok(g.nodes(Label::Diagnosis)
                .map(|dg| {
                    let node = dg.node_ref();
                    let observation = g.target(&node, RelType::OfObservation);
                    let appointment = observation
                        .map(|o| o.node_ref())
                        .and_then(|o| g.target(&o, RelType::OfAppointment));
                    let appointment_ref = appointment.map(|a| a.node_ref());
                    let patient = appointment_ref
                        .as_ref()
                        .and_then(|a| g.target(a, RelType::Patient));
                    let doctor = appointment_ref
                        .as_ref()
                        .and_then(|a| g.target(a, RelType::Doctor));
                    let date = DATE.read(dg);
                    DiagnosisRow {
                        diagn_id: dg.key.clone(),
                        year: date.year,
                        month: date.month,
                        day: date.day,
                        obser_id: observation.map(|o| o.key.clone()),
                        appoint_id: appointment.map(|a| a.key.clone()),
                        patient_id: patient.map(|p| p.key.clone()),
                        patient_name: patient.and_then(|p| p.str_prop("name")).map(str::to_owned),
                        doctor_id: doctor.map(|d| d.key.clone()),
                        doctor_name: doctor.and_then(|d| d.str_prop("name")).map(str::to_owned),
                        comment: dg.str_prop(COMMENT).map(str::to_owned),
                        file_handle: file_handle(g, &node),
                    }
                })
                .filter(|row| {
                    contains(Some(&row.diagn_id), filter.diagn_id.as_deref())
                        && equals(row.year, filter.year)
                        && equals(row.month, filter.month)
                        && equals(row.day, filter.day)
                        && contains(row.obser_id.as_deref(), filter.obser_id.as_deref())
                        && contains(row.appoint_id.as_deref(), filter.appoint_id.as_deref())
                        && contains(row.patient_id.as_deref(), filter.patient_id.as_deref())
                        && contains(row.patient_name.as_deref(), filter.patient_name.as_deref())
                        && contains(row.doctor_id.as_deref(), filter.doctor_id.as_deref())
                        && contains(row.doctor_name.as_deref(), filter.doctor_name.as_deref())
                        && contains(row.comment.as_deref(), filter.comment.as_deref())
                })
                .collect())
        })
    }

    pub fn create(&self, session: &Session, new: NewDiagnosis) -> ClinicResult<()> {
        session.require_admin()?;
        validate_date_parts(&new.date, DATE_LABEL)?;

        let mut props = Map::new();
        DATE.write(&new.date, &mut props);
        if let Some(comment) = &new.comment {
            props.insert(COMMENT.into(), optional_text(comment));
        }
        let node = NodeRef::new(Label::Diagnosis, new.diagn_id.as_str());

        self.store.write(|g| {
            let observation = link_target(g, Label::Observation, new.obser_id.as_ref())?;
            let blob = blob_target(g, new.file_handle)?;
            g.create_node(Label::Diagnosis, new.diagn_id.as_str(), props)?;
            relink(g, &node, RelType::OfObservation, observation.as_ref())?;
            relink(g, &node, RelType::File, blob.as_ref())
        })?;
        tracing::info!(diagn_id = %new.diagn_id, by = %session.login_name, "created diagnosis");
        Ok(())
    }

    pub fn update(
        &self,
        session: &Session,
        id: &EntityId,
        patch: DiagnosisPatch,
    ) -> ClinicResult<()> {
        session.require_admin()?;
        let node = NodeRef::new(Label::Diagnosis, id.as_str());

        self.store.write(|g| {
            let stored = match g.node(&node) {
                Some(n) => DATE.read(n),
                None => return Err(missing(Label::Diagnosis, id)),
            };
            let merged = stored.merge(&patch.date);
            validate_date_parts(&merged, DATE_LABEL)?;

            let observation = link_target(g, Label::Observation, patch.obser_id.as_ref())?;
            let blob = blob_target(g, patch.file_handle)?;

            let mut props = Map::new();
            DATE.write(&merged, &mut props);
            if let Some(comment) = &patch.comment {
                props.insert(COMMENT.into(), optional_text(comment));
            }
            g.set_properties(&node, props)?;
            relink(g, &node, RelType::OfObservation, observation.as_ref())?;
            relink(g, &node, RelType::File, blob.as_ref())
        })?;
        tracing::info!(diagn_id = %id, by = %session.login_name, "updated diagnosis");
        Ok(())
    }

    pub fn delete(&self, session: &Session, id: &EntityId) -> ClinicResult<()> {
        session.require_admin()?;

        self.store
            .write(|g| g.detach_delete(&NodeRef::new(Label::Diagnosis, id.as_str())))?;
        tracing::info!(diagn_id = %id, by = %session.login_name, "deleted diagnosis");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::appointment::{AppointmentRepository, NewAppointment};
    use crate::repositories::observation::{NewObservation, ObservationRepository};
    use crate::repositories::test_support::{admin, id, seed_blob, seed_people, standard};
    use crate::ClinicError;

    fn setup() -> (Arc<GraphStore>, DiagnosisRepository) {
        let store = Arc::new(GraphStore::in_memory());
        seed_people(&store);
        AppointmentRepository::new(store.clone())
            .create(
                &admin(),
                NewAppointment {
                    appoint_id: id("A1"),
                    date: DateParts::default(),
                    location: None,
                    patient_id: Some(id("P1")),
                    doctor_id: Some(id("D2")),
                },
            )
            .unwrap();
        ObservationRepository::new(store.clone())
            .create(
                &admin(),
                NewObservation {
                    obser_id: id("O1"),
                    date: DateParts::default(),
                    appoint_id: Some(id("A1")),
                    comment: None,
                    file_handle: None,
                },
            )
            .unwrap();
        (store.clone(), DiagnosisRepository::new(store))
    }

    fn diagnosis(diagn_id: &str) -> NewDiagnosis {
        NewDiagnosis {
            diagn_id: id(diagn_id),
            date: DateParts::ymd(2024, 6, 1),
            obser_id: Some(id("O1")),
            comment: Some("Hypertension".into()),
            file_handle: None,
        }
    }

    #[test]
    fn test_row_follows_observation_chain() {
        let (_, repo) = setup();
        repo.create(&admin(), diagnosis("G1")).unwrap();

        let row = &repo.list().unwrap()[0];

        assert_eq!(row.obser_id.as_deref(), Some("O1"));
        assert_eq!(row.appoint_id.as_deref(), Some("A1"));
        assert_eq!(row.patient_name.as_deref(), Some("Pia"));
        assert_eq!(row.doctor_id.as_deref(), Some("D2"));
    }

    #[test]
    fn test_create_rejects_bad_date_and_missing_observation() {
        let (_, repo) = setup();
        let mut bad_date = diagnosis("G1");
        bad_date.date = DateParts::new(None, Some(4), Some(31));
        let mut bad_link = diagnosis("G2");
        bad_link.obser_id = Some(id("O9"));

        assert!(matches!(
            repo.create(&admin(), bad_date),
            Err(ClinicError::InvalidInput(_))
        ));
        assert!(matches!(
            repo.create(&admin(), bad_link),
            Err(ClinicError::NotFound(_))
        ));
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn test_update_attaches_file_and_keeps_comment() {
        let (store, repo) = setup();
        seed_blob(&store, 3);
        repo.create(&admin(), diagnosis("G1")).unwrap();

        repo.update(
            &admin(),
            &id("G1"),
            DiagnosisPatch {
                file_handle: Some(3),
                ..Default::default()
            },
        )
        .unwrap();

        let row = &repo.list().unwrap()[0];
        assert_eq!(row.file_handle, Some(3));
        assert_eq!(row.comment.as_deref(), Some("Hypertension"));
        assert_eq!(row.year, Some(2024));
    }

    #[test]
    fn test_delete_requires_admin() {
        let (_, repo) = setup();
        repo.create(&admin(), diagnosis("G1")).unwrap();

        assert!(matches!(
            repo.delete(&standard(), &id("G1")),
            Err(ClinicError::PermissionDenied(_))
        ));
        repo.delete(&admin(), &id("G1")).unwrap();
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn test_search_by_comment_and_month() {
        let (_, repo) = setup();
        repo.create(&admin(), diagnosis("G1")).unwrap();
        let mut other = diagnosis("G2");
        other.comment = Some("Asthma".into());
        repo.create(&admin(), other).unwrap();

        let rows = repo
            .search(&DiagnosisFilter {
                month: Some(6),
                comment: Some("Asth".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].diagn_id, "G2");
    }
}
