//! Observations recorded during an appointment, optionally with an attached file.

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
    year: "obs_year",
    month: "obs_month",
    day: "obs_day",
};
const DATE_LABEL: &str = "observation date";
const COMMENT: &str = "obs_comment_text";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ObservationRow {
    pub obser_id: String,
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub day: Option<i64>,
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
pub struct NewObservation {
    pub obser_id: EntityId,
    #[serde(default)]
    pub date: DateParts,
    #[serde(default)]
    pub appoint_id: Option<EntityId>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Handle of an already stored attachment.
    #[serde(default)]
    pub file_handle: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ObservationPatch {
    #[serde(default)]
    pub date: DateParts,
    #[serde(default)]
    pub appoint_id: Option<EntityId>,
    /// Blank clears the comment.
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub file_handle: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ObservationFilter {
    pub obser_id: Option<String>,
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub day: Option<i64>,
    pub appoint_id: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
    pub comment: Option<String>,
}

/// Observation repository.
#[derive(Clone, Debug)]
pub struct ObservationRepository {
    store: Arc<GraphStore>,
}

impl ObservationRepository {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> ClinicResult<Vec<ObservationRow>> {
        self.search(&ObservationFilter::default())
    }

    pub fn search(&self, filter: &ObservationFilter) -> ClinicResult<Vec<ObservationRow>> {
        self.store.read(|g| {
            Ok(g.nodes(Label::Observation)
                .map(|o| {
                    let node = o.node_ref();
                    let appointment = g.target(&node, RelType::OfAppointment);
                    let appointment_ref = appointment.map(|a| a.node_ref());
                    let patient = appointment_ref
                        .as_ref()
                        .and_then(|a| g.target(a, RelType::Patient));
                    let doctor = appointment_ref
                        .as_ref()
                        .and_then(|a| g.target(a, RelType::Doctor));
                    let date = DATE.read(o);
                    ObservationRow {
                        obser_id: o.key.clone(),
                        year: date.year,
                        month: date.month,
                        day: date.day,
                        appoint_id: appointment.map(|a| a.key.clone()),
                        patient_id: patient.map(|p| p.key.clone()),
                        patient_name: patient.and_then(|p| p.str_prop("name")).map(str::to_owned),
                        doctor_id: doctor.map(|d| d.key.clone()),
                        doctor_name: doctor.and_then(|d| d.str_prop("name")).map(str::to_owned),
                        comment: o.str_prop(COMMENT).map(str::to_owned),
                        file_handle: file_handle(g, &node),
                    }
                })
                .filter(|row| {
                    contains(Some(&row.obser_id), filter.obser_id.as_deref())
                        && equals(row.year, filter.year)
                        && equals(row.month, filter.month)
                        && equals(row.day, filter.day)
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

    pub fn create(&self, session: &Session, new: NewObservation) -> ClinicResult<()> {
        session.require_admin()?;
        validate_date_parts(&new.date, DATE_LABEL)?;

        let mut props = Map::new();
        DATE.write(&new.date, &mut props);
        if let Some(comment) = &new.comment {
            props.insert(COMMENT.into(), optional_text(comment));
        }
        let node = NodeRef::new(Label::Observation, new.obser_id.as_str());

        self.store.write(|g| {
            let appointment = link_target(g, Label::Appointment, new.appoint_id.as_ref())?;
            let blob = blob_target(g, new.file_handle)?;
            g.create_node(Label::Observation, new.obser_id.as_str(), props)?;
            relink(g, &node, RelType::OfAppointment, appointment.as_ref())?;
            relink(g, &node, RelType::File, blob.as_ref())
        })?;
        tracing::info!(obser_id = %new.obser_id, by = %session.login_name, "created observation");
        Ok(())
    }

    pub fn update(
        &self,
        session: &Session,
        id: &EntityId,
        patch: ObservationPatch,
    ) -> ClinicResult<()> {
        session.require_admin()?;
        let node = NodeRef::new(Label::Observation, id.as_str());

        self.store.write(|g| {
            let stored = match g.node(&node) {
                Some(n) => DATE.read(n),
                None => return Err(missing(Label::Observation, id)),
            };
            let merged = stored.merge(&patch.date);
            validate_date_parts(&merged, DATE_LABEL)?;

            let appointment = link_target(g, Label::Appointment, patch.appoint_id.as_ref())?;
            let blob = blob_target(g, patch.file_handle)?;

            let mut props = Map::new();
            DATE.write(&merged, &mut props);
            if let Some(comment) = &patch.comment {
                props.insert(COMMENT.into(), optional_text(comment));
            }
            g.set_properties(&node, props)?;
            relink(g, &node, RelType::OfAppointment, appointment.as_ref())?;
            relink(g, &node, RelType::File, blob.as_ref())
        })?;
        tracing::info!(obser_id = %id, by = %session.login_name, "updated observation");
        Ok(())
    }

    pub fn delete(&self, session: &Session, id: &EntityId) -> ClinicResult<()> {
        session.require_admin()?;

        self.store
            .write(|g| g.detach_delete(&NodeRef::new(Label::Observation, id.as_str())))?;
        tracing::info!(obser_id = %id, by = %session.login_name, "deleted observation");
        Ok(())
    }
}
