//! Doctors, their department, and their assigned patients.

use crate::graph::{GraphStore, Label, NodeRef, RelType};
use crate::repositories::shared::{contains, link_target, missing, relink};
use crate::schema::object;
use crate::session::Session;
use crate::ClinicResult;
use clinic_types::{EntityId, NonEmptyText};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// One row per assigned patient; a doctor without patients yields one row with no patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DoctorRow {
    pub doctor_id: String,
    pub name: Option<String>,
    pub dept_id: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewDoctor {
    pub doctor_id: EntityId,
    pub name: NonEmptyText,
    #[serde(default)]
    pub dept_id: Option<EntityId>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DoctorPatch {
    #[serde(default)]
    pub name: Option<NonEmptyText>,
    #[serde(default)]
    pub dept_id: Option<EntityId>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct DoctorFilter {
    pub doctor_id: Option<String>,
    pub name: Option<String>,
    pub dept_id: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
}

/// Doctor repository.
#[derive(Clone, Debug)]
pub struct DoctorRepository {
    store: Arc<GraphStore>,
}

impl DoctorRepository {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> ClinicResult<Vec<DoctorRow>> {
        self.search(&DoctorFilter::default())
    }

    pub fn search(&self, filter: &DoctorFilter) -> ClinicResult<Vec<DoctorRow>> {
        self.store.read(|g| {
            let mut rows = Vec::new();
            for doctor in g.nodes(Label::Doctor) {
                let node = doctor.node_ref();
                let dept_id = g.target(&node, RelType::WorksIn).map(|d| d.key.clone());
                let row = |patient: Option<(&str, Option<&str>)>| DoctorRow {
                    doctor_id: doctor.key.clone(),
                    name: doctor.str_prop("name").map(str::to_owned),
                    dept_id: dept_id.clone(),
                    patient_id: patient.map(|(id, _)| id.to_owned()),
                    patient_name: patient.and_then(|(_, name)| name).map(str::to_owned),
                };

                let patients = g.sources(&node, RelType::AssignedTo);
                if patients.is_empty() {
                    rows.push(row(None));
                } else {
                    rows.extend(
                        patients
                            .into_iter()
                            .map(|p| row(Some((p.key.as_str(), p.str_prop("name"))))),
                    );
                }
            }

            rows.retain(|row| {
                contains(Some(&row.doctor_id), filter.doctor_id.as_deref())
                    && contains(row.name.as_deref(), filter.name.as_deref())
                    && contains(row.dept_id.as_deref(), filter.dept_id.as_deref())
                    && contains(row.patient_id.as_deref(), filter.patient_id.as_deref())
                    && contains(row.patient_name.as_deref(), filter.patient_name.as_deref())
            });
            Ok(rows)
        })
    }

    pub fn create(&self, session: &Session, new: NewDoctor) -> ClinicResult<()> {
        session.require_admin()?;

        let props = object(json!({ "name": new.name.as_str() }));
        let node = NodeRef::new(Label::Doctor, new.doctor_id.as_str());

        self.store.write(|g| {
            let dept = link_target(g, Label::Department, new.dept_id.as_ref())?;
            g.create_node(Label::Doctor, new.doctor_id.as_str(), props)?;
            relink(g, &node, RelType::WorksIn, dept.as_ref())
        })?;
        tracing::info!(doctor_id = %new.doctor_id, by = %session.login_name, "created doctor");
        Ok(())
    }

    pub fn update(&self, session: &Session, id: &EntityId, patch: DoctorPatch) -> ClinicResult<()> {
        session.require_admin()?;

        let mut props = Map::new();
        if let Some(name) = &patch.name {
            props.insert("name".into(), Value::from(name.as_str()));
        }
        let node = NodeRef::new(Label::Doctor, id.as_str());

        self.store.write(|g| {
            if !g.contains(&node) {
                return Err(missing(Label::Doctor, id));
            }
            let dept = link_target(g, Label::Department, patch.dept_id.as_ref())?;
            g.set_properties(&node, props)?;
            relink(g, &node, RelType::WorksIn, dept.as_ref())
        })?;
        tracing::info!(doctor_id = %id, by = %session.login_name, "updated doctor");
        Ok(())
    }

    pub fn delete(&self, session: &Session, id: &EntityId) -> ClinicResult<()> {
        session.require_admin()?;

        self.store
            .write(|g| g.detach_delete(&NodeRef::new(Label::Doctor, id.as_str())))?;
        tracing::info!(doctor_id = %id, by = %session.login_name, "deleted doctor");
        Ok(())
    }
}
