//! Store schema and bootstrap.
//!
//! Each node label has one key property whose values are unique within the label. The graph
//! enforces this structurally (nodes are keyed by label and key); the named constraints below
//! document it and appear in duplicate-key errors.

use crate::constants::{
    ATTACHMENT_COUNTER, COUNTERS_KEY, DEFAULT_ADMIN_NAME, DEFAULT_ADMIN_PASSWORD,
    DEFAULT_USER_NAME, DEFAULT_USER_PASSWORD,
};
use crate::graph::{GraphData, GraphStore, Label, NodeRef};
use crate::password::PasswordDigest;
use crate::ClinicResult;
use serde_json::{json, Map, Value};

/// A uniqueness constraint on a label's key property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: &'static str,
    pub label: Label,
    pub property: &'static str,
}

const fn constraint(name: &'static str, label: Label, property: &'static str) -> UniqueConstraint {
    UniqueConstraint {
        name,
        label,
        property,
    }
}

/// All uniqueness constraints of the schema.
pub const CONSTRAINTS: [UniqueConstraint; 10] = [
    constraint("clinic_id", Label::Clinic, "cli_id"),
    constraint("dept_id", Label::Department, "dept_id"),
    constraint("doctor_id", Label::Doctor, "doctor_ID"),
    constraint("patient_id", Label::Patient, "patient_ID"),
    constraint("appt_id", Label::Appointment, "appoint_id"),
    constraint("obser_id", Label::Observation, "obser_id"),
    constraint("diagn_id", Label::Diagnosis, "diagn_id"),
    constraint("blob_oid", Label::Blob, "oid"),
    constraint("admin_name", Label::Admin, "name"),
    constraint("user_name", Label::User, "name"),
];

/// The constraint covering `label`, if any (`Counters` has none).
pub fn constraint_for(label: Label) -> Option<&'static UniqueConstraint> {
    CONSTRAINTS.iter().find(|c| c.label == label)
}

/// What a bootstrap run changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub created_counters: bool,
    pub created_accounts: Vec<String>,
}

/// Prepares a store for use. Safe to run repeatedly.
///
/// Ensures the `Counters {id: 'global', lo_oid: 0}` node exists. With `seed_defaults`, also
/// creates the default `admin/admin` administrator and `user1/user123` standard account when
/// they are absent; existing accounts keep their passwords.
pub fn bootstrap(store: &GraphStore, seed_defaults: bool) -> ClinicResult<BootstrapReport> {
    let report = store.write(|g| {
        let mut report = BootstrapReport::default();

        let counters = NodeRef::new(Label::Counters, COUNTERS_KEY);
        if !g.contains(&counters) {
            g.create_node(
                Label::Counters,
                COUNTERS_KEY,
                object(json!({ ATTACHMENT_COUNTER: 0 })),
            )?;
            report.created_counters = true;
        }

        if seed_defaults {
            let seeds = [
                (Label::Admin, DEFAULT_ADMIN_NAME, DEFAULT_ADMIN_PASSWORD),
                (Label::User, DEFAULT_USER_NAME, DEFAULT_USER_PASSWORD),
            ];
            for (label, name, password) in seeds {
                if seed_account(g, label, name, password)? {
                    report.created_accounts.push(name.to_owned());
                }
            }
        }

        Ok(report)
    })?;

    tracing::info!(
        created_counters = report.created_counters,
        created_accounts = ?report.created_accounts,
        "bootstrap complete"
    );
    Ok(report)
}

fn seed_account(g: &mut GraphData, label: Label, name: &str, password: &str) -> ClinicResult<bool> {
    if g.contains(&NodeRef::new(label, name)) {
        return Ok(false);
    }
    g.create_node(
        label,
        name,
        object(json!({ "password": PasswordDigest::new(password).to_string() })),
    )?;
    Ok(true)
}

pub(crate) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
