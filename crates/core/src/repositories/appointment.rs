//! Appointments between a patient and a doctor.

use crate::graph::{GraphStore, Label, NodeRef, RelType};
use crate::repositories::shared::{
    contains, equals, link_target, missing, nulls_last, optional_text, relink, DateFields,
};
use crate::session::Session;
use crate::validation::{validate_date_parts, DateParts};
use crate::ClinicResult;
use clinic_types::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::sync::Arc;

const DATE: DateFields = DateFields {
    year: "appoint_year",
    month: "appoint_month",
    day: "appoint_day",
};
const DATE_LABEL: &str = "appointment date";
const LOCATION: &str = "appoint_location";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AppointmentRow {
    pub appoint_id: String,
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub day: Option<i64>,
    pub location: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewAppointment {
    pub appoint_id: EntityId,
    #[serde(default)]
    pub date: DateParts,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub patient_id: Option<EntityId>,
    #[serde(default)]
    pub doctor_id: Option<EntityId>,
}

/// Changes to an appointment. Set date parts replace the stored ones and the merged date is
/// validated as a whole.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AppointmentPatch {
    #[serde(default)]
    pub date: DateParts,
    /// Blank clears the location.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub patient_id: Option<EntityId>,
    #[serde(default)]
    pub doctor_id: Option<EntityId>,
}

/// Substring filters on ids, names and location; equality on date parts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct AppointmentFilter {
    pub appoint_id: Option<String>,
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub day: Option<i64>,
    pub location: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
}

/// Appointment repository.
#[derive(Clone, Debug)]
pub struct AppointmentRepository {
    store: Arc<GraphStore>,
}

impl AppointmentRepository {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    /// All appointments, ordered by date (unknown parts last), then id.
    pub fn list(&self) -> ClinicResult<Vec<AppointmentRow>> {
        self.search(&AppointmentFilter::default())
    }

    pub fn search(&self, filter: &AppointmentFilter) -> ClinicResult<Vec<AppointmentRow>> {
        let mut rows = self.store.read(|g| {
            Ok(g.nodes(Label::Appointment)
                .map(|a| {
                    let node = a.node_ref();
                    let patient = g.target(&node, RelType::Patient);
                    let doctor = g.target(&node, RelType::Doctor);
                    let date = DATE.read(a);
                    AppointmentRow {
                        appoint_id: a.key.clone(),
                        year: date.year,
                        month: date.month,
                        day: date.day,
                        location: a.str_prop(LOCATION).map(str::to_owned),
                        patient_id: patient.map(|p| p.key.clone()),
                        patient_name: patient.and_then(|p| p.str_prop("name")).map(str::to_owned),
                        doctor_id: doctor.map(|d| d.key.clone()),
                        doctor_name: doctor.and_then(|d| d.str_prop("name")).map(str::to_owned),
                    }
                })
                .filter(|row| {
                    contains(Some(&row.appoint_id), filter.appoint_id.as_deref())
                        && equals(row.year, filter.year)
                        && equals(row.month, filter.month)
                        && equals(row.day, filter.day)
                        && contains(row.location.as_deref(), filter.location.as_deref())
                        && contains(row.patient_id.as_deref(), filter.patient_id.as_deref())
                        && contains(row.patient_name.as_deref(), filter.patient_name.as_deref())
                        && contains(row.doctor_id.as_deref(), filter.doctor_id.as_deref())
                        && contains(row.doctor_name.as_deref(), filter.doctor_name.as_deref())
                })
                .collect::<Vec<_>>())
        })?;

        rows.sort_by(|a, b| {
            nulls_last(&a.year, &b.year)
                .then_with(|| nulls_last(&a.month, &b.month))
                .then_with(|| nulls_last(&a.day, &b.day))
                .then_with(|| a.appoint_id.cmp(&b.appoint_id))
        });
        Ok(rows)
    }

    pub fn create(&self, session: &Session, new: NewAppointment) -> ClinicResult<()> {
        session.require_admin()?;
        validate_date_parts(&new.date, DATE_LABEL)?;

        let mut props = Map::new();
        DATE.write(&new.date, &mut props);
        if let Some(location) = &new.location {
            props.insert(LOCATION.into(), optional_text(location));
        }
        let node = NodeRef::new(Label::Appointment, new.appoint_id.as_str());

        self.store.write(|g| {
            let patient = link_target(g, Label::Patient, new.patient_id.as_ref())?;
            let doctor = link_target(g, Label::Doctor, new.doctor_id.as_ref())?;
            g.create_node(Label::Appointment, new.appoint_id.as_str(), props)?;
            relink(g, &node, RelType::Patient, patient.as_ref())?;
            relink(g, &node, RelType::Doctor, doctor.as_ref())
        })?;
        tracing::info!(appoint_id = %new.appoint_id, by = %session.login_name, "created appointment");
        Ok(())
    }

    pub fn update(
        &self,
        session: &Session,
        id: &EntityId,
        patch: AppointmentPatch,
    ) -> ClinicResult<()> {
        session.require_admin()?;
        let node = NodeRef::new(Label::Appointment, id.as_str());

        self.store.write(|g| {
            let stored = match g.node(&node) {
                Some(n) => DATE.read(n),
                None => return Err(missing(Label::Appointment, id)),
            };
            let merged = stored.merge(&patch.date);
            validate_date_parts(&merged, DATE_LABEL)?;

            let patient = link_target(g, Label::Patient, patch.patient_id.as_ref())?;
            let doctor = link_target(g, Label::Doctor, patch.doctor_id.as_ref())?;

            let mut props = Map::new();
            DATE.write(&merged, &mut props);
            if let Some(location) = &patch.location {
                props.insert(LOCATION.into(), optional_text(location));
            }
            g.set_properties(&node, props)?;
            relink(g, &node, RelType::Patient, patient.as_ref())?;
            relink(g, &node, RelType::Doctor, doctor.as_ref())
        })?;
        tracing::info!(appoint_id = %id, by = %session.login_name, "updated appointment");
        Ok(())
    }

    pub fn delete(&self, session: &Session, id: &EntityId) -> ClinicResult<()> {
        session.require_admin()?;

        self.store
            .write(|g| g.detach_delete(&NodeRef::new(Label::Appointment, id.as_str())))?;
        tracing::info!(appoint_id = %id, by = %session.login_name, "deleted appointment");
        Ok(())
    }
}
