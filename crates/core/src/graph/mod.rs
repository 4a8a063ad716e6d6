//! Embedded property graph.
//!
//! Clinical records are nodes (clinics, departments, doctors, patients, appointments,
//! observations, diagnoses, blobs, accounts, counters) connected by single-valued typed
//! relationships. [`GraphData`] is the in-memory graph; [`GraphStore`] wraps it in read and write
//! sessions over a memory or file backend.

mod model;
mod store;

pub use model::{Edge, GraphData, GraphSnapshot, Label, Node, NodeRef, RelType};
pub use store::GraphStore;
