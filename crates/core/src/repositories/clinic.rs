//! Clinics.

use crate::graph::{GraphStore, Label, NodeRef};
use crate::repositories::shared::{contains, missing, optional_text};
use crate::schema::object;
use crate::session::Session;
use crate::ClinicResult;
use clinic_types::{EntityId, NonEmptyText};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const NAME: &str = "cli_name";
const ADDRESS: &str = "address";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ClinicRow {
    pub cli_id: String,
    pub cli_name: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewClinic {
    pub cli_id: EntityId,
    pub cli_name: NonEmptyText,
    #[serde(default)]
    pub address: Option<String>,
}

/// Changes to a clinic. Unset fields are left unchanged; a blank `address` clears it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ClinicPatch {
    #[serde(default)]
    pub cli_name: Option<NonEmptyText>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Substring filters; unset fields match everything.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ClinicFilter {
    pub cli_id: Option<String>,
    pub cli_name: Option<String>,
    pub address: Option<String>,
}

/// Clinic repository.
#[derive(Clone, Debug)]
pub struct ClinicRepository {
    store: Arc<GraphStore>,
}

impl ClinicRepository {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    /// All clinics, ordered by id.
    pub fn list(&self) -> ClinicResult<Vec<ClinicRow>> {
        self.search(&ClinicFilter::default())
    }

    pub fn search(&self, filter: &ClinicFilter) -> ClinicResult<Vec<ClinicRow>> {
        self.store.read(|g| {
            Ok(g.nodes(Label::Clinic)
                .map(|c| ClinicRow {
                    cli_id: c.key.clone(),
                    cli_name: c.str_prop(NAME).map(str::to_owned),
                    address: c.str_prop(ADDRESS).map(str::to_owned),
                })
                .filter(|row| {
                    contains(Some(&row.cli_id), filter.cli_id.as_deref())
                        && contains(row.cli_name.as_deref(), filter.cli_name.as_deref())
                        && contains(row.address.as_deref(), filter.address.as_deref())
                })
                .collect())
        })
    }

    pub fn create(&self, session: &Session, new: NewClinic) -> ClinicResult<()> {
        session.require_admin()?;

        let mut props = object(json!({ NAME: new.cli_name.as_str() }));
        if let Some(address) = &new.address {
            props.insert(ADDRESS.into(), optional_text(address));
        }

        self.store
            .write(|g| g.create_node(Label::Clinic, new.cli_id.as_str(), props))?;
        tracing::info!(cli_id = %new.cli_id, by = %session.login_name, "created clinic");
        Ok(())
    }

    pub fn update(&self, session: &Session, id: &EntityId, patch: ClinicPatch) -> ClinicResult<()> {
        session.require_admin()?;

        let mut props = Map::new();
        if let Some(name) = &patch.cli_name {
            props.insert(NAME.into(), Value::from(name.as_str()));
        }
        if let Some(address) = &patch.address {
            props.insert(ADDRESS.into(), optional_text(address));
        }

        let node = NodeRef::new(Label::Clinic, id.as_str());
        self.store.write(|g| {
            if !g.contains(&node) {
                return Err(missing(Label::Clinic, id));
            }
            g.set_properties(&node, props)
        })?;
        tracing::info!(cli_id = %id, by = %session.login_name, "updated clinic");
        Ok(())
    }

    pub fn delete(&self, session: &Session, id: &EntityId) -> ClinicResult<()> {
        session.require_admin()?;

        self.store
            .write(|g| g.detach_delete(&NodeRef::new(Label::Clinic, id.as_str())))?;
        tracing::info!(cli_id = %id, by = %session.login_name, "deleted clinic");
        Ok(())
    }
}
