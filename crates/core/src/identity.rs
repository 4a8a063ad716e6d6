//! Identity resolution and role routing.
//!
//! Maps a logged-in account to the clinical person it acts as. An administrator account mapped to
//! a doctor acts as that doctor; a standard account mapped to a patient acts as that patient;
//! anyone else only has the operator role of their account.

use crate::accounts::account_person;
use crate::graph::{GraphData, GraphStore, Label, Node, NodeRef, RelType};
use crate::session::{Role, Session};
use crate::ClinicResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The kind of person an account acts as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum PersonKind {
    Doctor,
    Patient,
    AdminOnly,
}

impl PersonKind {
    /// The kind a message from this kind is addressed to.
    pub fn counterpart(self) -> Option<PersonKind> {
        match self {
            Self::Doctor => Some(Self::Patient),
            Self::Patient => Some(Self::Doctor),
            Self::AdminOnly => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Patient => "patient",
            Self::AdminOnly => "admin_only",
        }
    }
}

impl fmt::Display for PersonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sections of the operator surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Section {
    Clinics,
    Departments,
    Doctors,
    Patients,
    Appointments,
    Observations,
    Diagnoses,
    Messaging,
    Account,
}

impl Section {
    pub const ENTITIES: [Section; 7] = [
        Section::Clinics,
        Section::Departments,
        Section::Doctors,
        Section::Patients,
        Section::Appointments,
        Section::Observations,
        Section::Diagnoses,
    ];
}

/// A resolved caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Identity {
    pub user_type: PersonKind,
    /// Mapped doctor/patient id, or the login name when the account has no mapping.
    pub person_id: String,
    pub login_name: String,
    pub role: Role,
}

impl Identity {
    /// Sections this caller may open. Patients only get messaging and their account.
    pub fn sections(&self) -> Vec<Section> {
        match self.user_type {
            PersonKind::Patient => vec![Section::Messaging, Section::Account],
            PersonKind::Doctor | PersonKind::AdminOnly => Section::ENTITIES
                .into_iter()
                .chain([Section::Messaging, Section::Account])
                .collect(),
        }
    }

    pub fn can_open(&self, section: Section) -> bool {
        self.sections().contains(&section)
    }

    pub fn is_clinical(&self) -> bool {
        self.user_type != PersonKind::AdminOnly
    }
}

/// Someone the caller can message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Counterpart {
    pub id: String,
    pub name: Option<String>,
}

/// Identity service.
#[derive(Clone, Debug)]
pub struct IdentityService {
    store: Arc<GraphStore>,
}

impl IdentityService {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    pub fn resolve(&self, session: &Session) -> ClinicResult<Identity> {
        self.store.read(|g| Ok(resolve_in(g, session)))
    }

    /// Doctors get their patients, patients their doctors, everyone else nobody.
    pub fn counterparts(&self, session: &Session) -> ClinicResult<Vec<Counterpart>> {
        self.store.read(|g| {
            let me = resolve_in(g, session);
            Ok(counterparts_in(g, &me))
        })
    }
}

pub(crate) fn resolve_in(g: &GraphData, session: &Session) -> Identity {
    let person_id =
        account_person(g, &session.login_name).unwrap_or_else(|| session.login_name.clone());
    let user_type = match session.role {
        Role::Administrator if g.contains(&NodeRef::new(Label::Doctor, &person_id)) => {
            PersonKind::Doctor
        }
        Role::Standard if g.contains(&NodeRef::new(Label::Patient, &person_id)) => {
            PersonKind::Patient
        }
        _ => PersonKind::AdminOnly,
    };
    Identity {
        user_type,
        person_id,
        login_name: session.login_name.clone(),
        role: session.role,
    }
}

/// A patient and a doctor are counterparts when the patient is assigned to the doctor or when an
/// appointment links them. Sorted by id without duplicates.
pub(crate) fn counterparts_in(g: &GraphData, me: &Identity) -> Vec<Counterpart> {
    let mut found: BTreeMap<String, Option<String>> = BTreeMap::new();
    let mut add = |node: &Node| {
        found
            .entry(node.key.clone())
            .or_insert_with(|| node.str_prop("name").map(str::to_owned));
    };

    match me.user_type {
        PersonKind::Doctor => {
            let doctor = NodeRef::new(Label::Doctor, &me.person_id);
            g.sources(&doctor, RelType::AssignedTo)
                .into_iter()
                .filter(|n| n.label == Label::Patient)
                .for_each(&mut add);
            for appointment in g.sources(&doctor, RelType::Doctor) {
                if let Some(patient) = g.target(&appointment.node_ref(), RelType::Patient) {
                    add(patient);
                }
            }
        }
        PersonKind::Patient => {
            let patient = NodeRef::new(Label::Patient, &me.person_id);
            if let Some(doctor) = g.target(&patient, RelType::AssignedTo) {
                add(doctor);
            }
            for appointment in g.sources(&patient, RelType::Patient) {
                if let Some(doctor) = g.target(&appointment.node_ref(), RelType::Doctor) {
                    add(doctor);
                }
            }
        }
        PersonKind::AdminOnly => {}
    }

    found
        .into_iter()
        .map(|(id, name)| Counterpart { id, name })
        .collect()
}
