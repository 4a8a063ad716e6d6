//! Departments and their clinic.

use crate::graph::{GraphStore, Label, NodeRef, RelType};
use crate::repositories::shared::{contains, link_target, missing, relink};
use crate::schema::object;
use crate::session::Session;
use crate::ClinicResult;
use clinic_types::{EntityId, NonEmptyText};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const NAME: &str = "dept_name";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DepartmentRow {
    pub dept_id: String,
    pub dept_name: Option<String>,
    pub cli_id: Option<String>,
    pub cli_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewDepartment {
    pub dept_id: EntityId,
    pub dept_name: NonEmptyText,
    /// Clinic the department belongs to; must exist.
    #[serde(default)]
    pub cli_id: Option<EntityId>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DepartmentPatch {
    #[serde(default)]
    pub dept_name: Option<NonEmptyText>,
    /// Moves the department to another (existing) clinic.
    #[serde(default)]
    pub cli_id: Option<EntityId>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct DepartmentFilter {
    pub dept_id: Option<String>,
    pub dept_name: Option<String>,
    pub cli_id: Option<String>,
    pub cli_name: Option<String>,
}

/// Department repository.
#[derive(Clone, Debug)]
pub struct DepartmentRepository {
    store: Arc<GraphStore>,
}

impl DepartmentRepository {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> ClinicResult<Vec<DepartmentRow>> {
        self.search(&DepartmentFilter::default())
    }

    pub fn search(&self, filter: &DepartmentFilter) -> ClinicResult<Vec<DepartmentRow>> {
        self.store.read(|g| {
            Ok(g.nodes(Label::Department)
                .map(|d| {
                    let clinic = g.target(&d.node_ref(), RelType::BelongsTo);
                    DepartmentRow {
                        dept_id: d.key.clone(),
                        dept_name: d.str_prop(NAME).map(str::to_owned),
                        cli_id: clinic.map(|c| c.key.clone()),
                        cli_name: clinic.and_then(|c| c.str_prop("cli_name")).map(str::to_owned),
                    }
                })
                .filter(|row| {
                    contains(Some(&row.dept_id), filter.dept_id.as_deref())
                        && contains(row.dept_name.as_deref(), filter.dept_name.as_deref())
                        && contains(row.cli_id.as_deref(), filter.cli_id.as_deref())
                        && contains(row.cli_name.as_deref(), filter.cli_name.as_deref())
                })
                .collect())
        })
    }

    pub fn create(&self, session: &Session, new: NewDepartment) -> ClinicResult<()> {
        session.require_admin()?;

        let props = object(json!({ NAME: new.dept_name.as_str() }));
        let node = NodeRef::new(Label::Department, new.dept_id.as_str());

        self.store.write(|g| {
            let clinic = link_target(g, Label::Clinic, new.cli_id.as_ref())?;
            g.create_node(Label::Department, new.dept_id.as_str(), props)?;
            relink(g, &node, RelType::BelongsTo, clinic.as_ref())
        })?;
        tracing::info!(dept_id = %new.dept_id, by = %session.login_name, "created department");
        Ok(())
    }

    pub fn update(
        &self,
        session: &Session,
        id: &EntityId,
        patch: DepartmentPatch,
    ) -> ClinicResult<()> {
        session.require_admin()?;

        let mut props = Map::new();
        if let Some(name) = &patch.dept_name {
            props.insert(NAME.into(), Value::from(name.as_str()));
        }
        let node = NodeRef::new(Label::Department, id.as_str());

        self.store.write(|g| {
            if !g.contains(&node) {
                return Err(missing(Label::Department, id));
            }
            let clinic = link_target(g, Label::Clinic, patch.cli_id.as_ref())?;
            g.set_properties(&node, props)?;
            relink(g, &node, RelType::BelongsTo, clinic.as_ref())
        })?;
        tracing::info!(dept_id = %id, by = %session.login_name, "updated department");
        Ok(())
    }

    pub fn delete(&self, session: &Session, id: &EntityId) -> ClinicResult<()> {
        session.require_admin()?;

        self.store
            .write(|g| g.detach_delete(&NodeRef::new(Label::Department, id.as_str())))?;
        tracing::info!(dept_id = %id, by = %session.login_name, "deleted department");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::clinic::{ClinicRepository, NewClinic};
    use crate::repositories::test_support::{admin, id, standard, text};
    use crate::ClinicError;

    fn setup() -> (ClinicRepository, DepartmentRepository) {
        let store = Arc::new(GraphStore::in_memory());
        let clinics = ClinicRepository::new(store.clone());
        for (cli_id, name) in [("C1", "South"), ("C2", "North")] {
            clinics
                .create(
                    &admin(),
                    NewClinic {
                        cli_id: id(cli_id),
                        cli_name: text(name),
                        address: None,
                    },
                )
                .unwrap();
        }
        (clinics, DepartmentRepository::new(store))
    }

    fn new_dept(dept_id: &str, cli_id: Option<&str>) -> NewDepartment {
        NewDepartment {
            dept_id: id(dept_id),
            dept_name: text("Cardiology"),
            cli_id: cli_id.map(id),
        }
    }

    #[test]
    fn test_create_joins_clinic() {
        let (_, depts) = setup();
        depts.create(&admin(), new_dept("D1", Some("C1"))).unwrap();
        depts.create(&admin(), new_dept("D2", None)).unwrap();

        let rows = depts.list().unwrap();

        assert_eq!(rows[0].cli_id.as_deref(), Some("C1"));
        assert_eq!(rows[0].cli_name.as_deref(), Some("South"));
        assert_eq!(rows[1].cli_id, None);
    }

    #[test]
    fn test_create_with_missing_clinic_creates_nothing() {
        let (_, depts) = setup();

        let err = depts
            .create(&admin(), new_dept("D1", Some("C9")))
            .unwrap_err();

        assert!(matches!(err, ClinicError::NotFound(_)));
        assert!(depts.list().unwrap().is_empty());
    }

    #[test]
    fn test_update_repoints_single_edge() {
        let (_, depts) = setup();
        depts.create(&admin(), new_dept("D1", Some("C1"))).unwrap();

        depts
            .update(
                &admin(),
                &id("D1"),
                DepartmentPatch {
                    dept_name: None,
                    cli_id: Some(id("C2")),
                },
            )
            .unwrap();

        let rows = depts.list().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cli_id.as_deref(), Some("C2"));
        assert_eq!(rows[0].dept_name.as_deref(), Some("Cardiology"));
    }

    #[test]
    fn test_update_with_missing_clinic_changes_nothing() {
        let (_, depts) = setup();
        depts.create(&admin(), new_dept("D1", Some("C1"))).unwrap();

        let err = depts
            .update(
                &admin(),
                &id("D1"),
                DepartmentPatch {
                    dept_name: Some(text("Renamed")),
                    cli_id: Some(id("C9")),
                },
            )
            .unwrap_err();

        assert!(matches!(err, ClinicError::NotFound(_)));
        let row = &depts.list().unwrap()[0];
        assert_eq!(row.dept_name.as_deref(), Some("Cardiology"));
        assert_eq!(row.cli_id.as_deref(), Some("C1"));
    }

    #[test]
    fn test_search_on_joined_field_skips_unlinked_rows() {
        let (_, depts) = setup();
        depts.create(&admin(), new_dept("D1", Some("C1"))).unwrap();
        depts.create(&admin(), new_dept("D2", None)).unwrap();

        let rows = depts
            .search(&DepartmentFilter {
                cli_name: Some("South".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].dept_id, "D1");
    }

    #[test]
    fn test_deleting_clinic_detaches_departments() {
        let (clinics, depts) = setup();
        depts.create(&admin(), new_dept("D1", Some("C1"))).unwrap();

        clinics.delete(&admin(), &id("C1")).unwrap();

        let rows = depts.list().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cli_id, None);
    }

    #[test]
    fn test_standard_session_cannot_change_departments() {
        let (_, depts) = setup();
        depts.create(&admin(), new_dept("D1", Some("C1"))).unwrap();
        let before = depts.list().unwrap();

        let create = depts.create(&standard(), new_dept("D2", None));
        let update = depts.update(
            &standard(),
            &id("D1"),
            DepartmentPatch {
                dept_name: Some(text("Oncology")),
                cli_id: Some(id("C2")),
            },
        );
        let delete = depts.delete(&standard(), &id("D1"));

        for result in [create, update, delete] {
            assert!(matches!(result, Err(ClinicError::PermissionDenied(_))));
        }
        assert_eq!(depts.list().unwrap(), before);
    }
}
