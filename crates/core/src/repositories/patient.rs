//! Patients and their assigned doctor.

use crate::graph::{GraphStore, Label, NodeRef, RelType};
use crate::repositories::shared::{contains, link_target, missing, relink};
use crate::schema::object;
use crate::session::Session;
use crate::ClinicResult;
use clinic_types::{EntityId, NonEmptyText};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PatientRow {
    pub patient_id: String,
    pub name: Option<String>,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewPatient {
    pub patient_id: EntityId,
    pub name: NonEmptyText,
    #[serde(default)]
    pub doctor_id: Option<EntityId>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PatientPatch {
    #[serde(default)]
    pub name: Option<NonEmptyText>,
    /// Reassigns the patient to another (existing) doctor.
    #[serde(default)]
    pub doctor_id: Option<EntityId>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct PatientFilter {
    pub patient_id: Option<String>,
    pub name: Option<String>,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
}

/// Patient repository.
#[derive(Clone, Debug)]
pub struct PatientRepository {
    store: Arc<GraphStore>,
}

impl PatientRepository {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> ClinicResult<Vec<PatientRow>> {
        self.search(&PatientFilter::default())
    }

    pub fn search(&self, filter: &PatientFilter) -> ClinicResult<Vec<PatientRow>> {
        self.store.read(|g| {
            Ok(g.nodes(Label::Patient)
                .map(|p| {
                    let doctor = g.target(&p.node_ref(), RelType::AssignedTo);
                    PatientRow {
                        patient_id: p.key.clone(),
                        name: p.str_prop("name").map(str::to_owned),
                        doctor_id: doctor.map(|d| d.key.clone()),
                        doctor_name: doctor.and_then(|d| d.str_prop("name")).map(str::to_owned),
                    }
                })
                .filter(|row| {
                    contains(Some(&row.patient_id), filter.patient_id.as_deref())
                        && contains(row.name.as_deref(), filter.name.as_deref())
                        && contains(row.doctor_id.as_deref(), filter.doctor_id.as_deref())
                        && contains(row.doctor_name.as_deref(), filter.doctor_name.as_deref())
                })
                .collect())
        })
    }

    pub fn create(&self, session: &Session, new: NewPatient) -> ClinicResult<()> {
        session.require_admin()?;

        let props = object(json!({ "name": new.name.as_str() }));
        let node = NodeRef::new(Label::Patient, new.patient_id.as_str());

        self.store.write(|g| {
            let doctor = link_target(g, Label::Doctor, new.doctor_id.as_ref())?;
            g.create_node(Label::Patient, new.patient_id.as_str(), props)?;
            relink(g, &node, RelType::AssignedTo, doctor.as_ref())
        })?;
        tracing::info!(patient_id = %new.patient_id, by = %session.login_name, "created patient");
        Ok(())
    }

    pub fn update(
        &self,
        session: &Session,
        id: &EntityId,
        patch: PatientPatch,
    ) -> ClinicResult<()> {
        session.require_admin()?;

        let mut props = Map::new();
        if let Some(name) = &patch.name {
            props.insert("name".into(), Value::from(name.as_str()));
        }
        let node = NodeRef::new(Label::Patient, id.as_str());

        self.store.write(|g| {
            if !g.contains(&node) {
                return Err(missing(Label::Patient, id));
            }
            let doctor = link_target(g, Label::Doctor, patch.doctor_id.as_ref())?;
            g.set_properties(&node, props)?;
            relink(g, &node, RelType::AssignedTo, doctor.as_ref())
        })?;
        tracing::info!(patient_id = %id, by = %session.login_name, "updated patient");
        Ok(())
    }

    pub fn delete(&self, session: &Session, id: &EntityId) -> ClinicResult<()> {
        session.require_admin()?;

        self.store
            .write(|g| g.detach_delete(&NodeRef::new(Label::Patient, id.as_str())))?;
        tracing::info!(patient_id = %id, by = %session.login_name, "deleted patient");
        Ok(())
    }
}
