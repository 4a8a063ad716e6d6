//! Entity repositories.
//!
//! One service per clinical entity. Each exposes `list`, `search`, `create`, `update` and
//! `delete` over the graph store; writes take the caller's [`Session`](crate::Session) and
//! require the administrator role.

pub mod appointment;
pub mod clinic;
pub mod department;
pub mod diagnosis;
pub mod doctor;
pub mod observation;
pub mod patient;

pub(crate) mod shared;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::graph::{GraphStore, Label, NodeRef, RelType};
    use crate::schema::object;
    use crate::session::{Role, Session};
    use clinic_types::{EntityId, NonEmptyText};
    use serde_json::json;

    pub fn admin() -> Session {
        Session::new("admin", Role::Administrator)
    }

    pub fn standard() -> Session {
        Session::new("user1", Role::Standard)
    }

    pub fn id(value: &str) -> EntityId {
        EntityId::new(value).unwrap()
    }

    pub fn text(value: &str) -> NonEmptyText {
        NonEmptyText::new(value).unwrap()
    }

    /// Doctors D1 "Dr Ada" and D2 "Dr Bo", patient P1 "Pia" assigned to D1.
    pub fn seed_people(store: &GraphStore) {
        store
            .write(|g| {
                g.create_node(Label::Doctor, "D1", object(json!({ "name": "Dr Ada" })))?;
                g.create_node(Label::Doctor, "D2", object(json!({ "name": "Dr Bo" })))?;
                g.create_node(Label::Patient, "P1", object(json!({ "name": "Pia" })))?;
                g.set_single_edge(
                    &NodeRef::new(Label::Patient, "P1"),
                    RelType::AssignedTo,
                    &NodeRef::new(Label::Doctor, "D1"),
                )
            })
            .unwrap();
    }

    /// A blob node for `handle`, without any content file.
    pub fn seed_blob(store: &GraphStore, handle: u64) {
        store
            .write(|g| {
                g.create_node(
                    Label::Blob,
                    &handle.to_string(),
                    object(json!({ "url": format!("files/{}", handle) })),
                )
            })
            .unwrap();
    }
}
