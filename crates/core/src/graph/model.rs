//! In-memory graph model.
//!
//! Nodes are keyed by `(label, key)`, which makes every label's key property unique by
//! construction. Edges are directed, typed, and stored in an ordered set, so the serialized form
//! of a graph is deterministic.

use crate::schema::constraint_for;
use crate::{ClinicError, ClinicResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Node labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    Clinic,
    Department,
    Doctor,
    Patient,
    Appointment,
    Observation,
    Diagnosis,
    Blob,
    Admin,
    User,
    Counters,
}

impl Label {
    /// Name of the property that identifies nodes of this label.
    pub fn key_property(self) -> &'static str {
        match self {
            Self::Clinic => "cli_id",
            Self::Department => "dept_id",
            Self::Doctor => "doctor_ID",
            Self::Patient => "patient_ID",
            Self::Appointment => "appoint_id",
            Self::Observation => "obser_id",
            Self::Diagnosis => "diagn_id",
            Self::Blob => "oid",
            Self::Admin | Self::User => "name",
            Self::Counters => "id",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clinic => "Clinic",
            Self::Department => "Department",
            Self::Doctor => "Doctor",
            Self::Patient => "Patient",
            Self::Appointment => "Appointment",
            Self::Observation => "Observation",
            Self::Diagnosis => "Diagnosis",
            Self::Blob => "Blob",
            Self::Admin => "Admin",
            Self::User => "User",
            Self::Counters => "Counters",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelType {
    /// Department → Clinic
    BelongsTo,
    /// Doctor → Department
    WorksIn,
    /// Patient → Doctor
    AssignedTo,
    /// Appointment → Patient
    Patient,
    /// Appointment → Doctor
    Doctor,
    /// Observation → Appointment
    OfAppointment,
    /// Diagnosis → Observation
    OfObservation,
    /// Observation/Diagnosis → Blob
    File,
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BelongsTo => "BELONGS_TO",
            Self::WorksIn => "WORKS_IN",
            Self::AssignedTo => "ASSIGNED_TO",
            Self::Patient => "PATIENT",
            Self::Doctor => "DOCTOR",
            Self::OfAppointment => "OF_APPOINTMENT",
            Self::OfObservation => "OF_OBSERVATION",
            Self::File => "FILE",
        };
        f.write_str(name)
    }
}

/// Identity of a node.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: Label,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: Label, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.label, self.key)
    }
}

/// A node with its properties. The key is not repeated in `properties`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub label: Label,
    pub key: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Node {
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.label, self.key.clone())
    }

    pub fn str_prop(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    pub fn int_prop(&self, name: &str) -> Option<i64> {
        self.properties.get(name).and_then(Value::as_i64)
    }
}

/// A directed, typed relationship.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeRef,
    pub rel: RelType,
    pub to: NodeRef,
}

// ============================================================================
// GRAPH DATA
// ============================================================================

/// The whole graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GraphSnapshot", into = "GraphSnapshot")]
pub struct GraphData {
    nodes: BTreeMap<NodeRef, Node>,
    edges: BTreeSet<Edge>,
}

/// Serialized form of [`GraphData`]: flat node and edge lists.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

impl From<GraphSnapshot> for GraphData {
    fn from(snapshot: GraphSnapshot) -> Self {
        let nodes: BTreeMap<NodeRef, Node> = snapshot
            .nodes
            .into_iter()
            .map(|node| (node.node_ref(), node))
            .collect();
        // Drop dangling edges rather than carry them forward.
        let edges = snapshot
            .edges
            .into_iter()
            .filter(|e| nodes.contains_key(&e.from) && nodes.contains_key(&e.to))
            .collect();
        Self { nodes, edges }
    }
}

impl From<GraphData> for GraphSnapshot {
    fn from(data: GraphData) -> Self {
        Self {
            nodes: data.nodes.into_values().collect(),
            edges: data.edges.into_iter().collect(),
        }
    }
}

impl GraphData {
    pub fn node(&self, node: &NodeRef) -> Option<&Node> {
        self.nodes.get(node)
    }

    pub fn contains(&self, node: &NodeRef) -> bool {
        self.nodes.contains_key(node)
    }

    /// All nodes of `label`, ordered by key.
    pub fn nodes(&self, label: Label) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values().filter(move |n| n.label == label)
    }

    /// Fails with `NotFound` unless `node` exists.
    pub fn require(&self, node: &NodeRef) -> ClinicResult<&Node> {
        self.nodes
            .get(node)
            .ok_or_else(|| ClinicError::not_found(node.label.as_str(), &node.key))
    }

    /// Creates a node.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists`, naming the uniqueness constraint, if a node with the same label
    /// and key exists.
    pub fn create_node(
        &mut self,
        label: Label,
        key: &str,
        properties: Map<String, Value>,
    ) -> ClinicResult<()> {
        let node_ref = NodeRef::new(label, key);
        if self.nodes.contains_key(&node_ref) {
            let constraint = constraint_for(label).map(|c| c.name).unwrap_or("unique key");
            return Err(ClinicError::AlreadyExists(format!(
                "{} with {} '{}' ({})",
                label,
                label.key_property(),
                key,
                constraint
            )));
        }

        let properties = properties
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect();
        self.nodes.insert(
            node_ref,
            Node {
                label,
                key: key.to_owned(),
                properties,
            },
        );
        Ok(())
    }

    /// Merges `properties` into an existing node. A JSON `null` removes the property.
    pub fn set_properties(
        &mut self,
        node: &NodeRef,
        properties: Map<String, Value>,
    ) -> ClinicResult<()> {
        let target = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| ClinicError::not_found(node.label.as_str(), &node.key))?;

        for (name, value) in properties {
            if value.is_null() {
                target.properties.remove(&name);
            } else {
                target.properties.insert(name, value);
            }
        }
        Ok(())
    }

    /// Changes the key of an existing node, carrying its properties and edges along.
    pub fn rekey_node(&mut self, node: &NodeRef, new_key: &str) -> ClinicResult<()> {
        let renamed = NodeRef::new(node.label, new_key);
        if self.nodes.contains_key(&renamed) {
            return Err(ClinicError::already_exists(node.label.as_str(), new_key));
        }
        let mut data = self
            .nodes
            .remove(node)
            .ok_or_else(|| ClinicError::not_found(node.label.as_str(), &node.key))?;
        data.key = new_key.to_owned();
        self.nodes.insert(renamed.clone(), data);

        let moved: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| e.from == *node || e.to == *node)
            .cloned()
            .collect();
        for edge in moved {
            self.edges.remove(&edge);
            let from = if edge.from == *node { renamed.clone() } else { edge.from };
            let to = if edge.to == *node { renamed.clone() } else { edge.to };
            self.edges.insert(Edge { from, rel: edge.rel, to });
        }
        Ok(())
    }

    /// Removes a node and every edge touching it.
    pub fn detach_delete(&mut self, node: &NodeRef) -> ClinicResult<()> {
        if self.nodes.remove(node).is_none() {
            return Err(ClinicError::not_found(node.label.as_str(), &node.key));
        }
        self.edges.retain(|e| e.from != *node && e.to != *node);
        Ok(())
    }

    /// The target of `from`'s outgoing `rel` edge, if any.
    pub fn target(&self, from: &NodeRef, rel: RelType) -> Option<&Node> {
        self.edges
            .iter()
            .find(|e| e.from == *from && e.rel == rel)
            .and_then(|e| self.nodes.get(&e.to))
    }

    /// Nodes with an outgoing `rel` edge into `to`, ordered by node identity.
    pub fn sources(&self, to: &NodeRef, rel: RelType) -> Vec<&Node> {
        self.edges
            .iter()
            .filter(|e| e.to == *to && e.rel == rel)
            .filter_map(|e| self.nodes.get(&e.from))
            .collect()
    }

    /// Replaces every outgoing `rel` edge of `from` with a single edge to `to`.
    ///
    /// Both ends are checked before anything changes, so a missing node leaves the graph as it
    /// was.
    pub fn set_single_edge(
        &mut self,
        from: &NodeRef,
        rel: RelType,
        to: &NodeRef,
    ) -> ClinicResult<()> {
        self.require(from)?;
        self.require(to)?;

        self.clear_edges(from, rel);
        self.edges.insert(Edge {
            from: from.clone(),
            rel,
            to: to.clone(),
        });
        Ok(())
    }

    /// Removes every outgoing `rel` edge of `from`.
    pub fn clear_edges(&mut self, from: &NodeRef, rel: RelType) {
        self.edges.retain(|e| !(e.from == *from && e.rel == rel));
    }

    /// Number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Increments an integer property (absent counts as 0) and returns the new value.
    pub fn increment_counter(&mut self, node: &NodeRef, property: &str) -> ClinicResult<u64> {
        let target = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| ClinicError::not_found(node.label.as_str(), &node.key))?;

        let current = match target.properties.get(property) {
            None => 0,
            Some(value) => value.as_u64().ok_or_else(|| {
                ClinicError::InvalidInput(format!(
                    "counter {}.{} is not a non-negative integer",
                    node, property
                ))
            })?,
        };
        let next = current + 1;
        target
            .properties
            .insert(property.to_owned(), Value::from(next));
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn sample() -> GraphData {
        let mut g = GraphData::default();
        g.create_node(Label::Doctor, "D1", props(json!({"name": "Dr A"})))
            .unwrap();
        g.create_node(Label::Doctor, "D2", props(json!({"name": "Dr B"})))
            .unwrap();
        g.create_node(Label::Patient, "P1", props(json!({"name": "Pat"})))
            .unwrap();
        g
    }

    #[test]
    fn test_create_node_rejects_duplicate_key() {
        let mut g = sample();

        let err = g
            .create_node(Label::Doctor, "D1", Map::new())
            .unwrap_err();

        assert!(matches!(err, ClinicError::AlreadyExists(ref m) if m.contains("doctor_id")));
        // same key under another label is a different node
        g.create_node(Label::Patient, "D1", Map::new()).unwrap();
    }

    #[test]
    fn test_set_properties_merges_and_null_removes() {
        let mut g = sample();
        let d1 = NodeRef::new(Label::Doctor, "D1");

        g.set_properties(&d1, props(json!({"title": "GP"}))).unwrap();
        g.set_properties(&d1, props(json!({"name": null}))).unwrap();

        let node = g.node(&d1).unwrap();
        assert_eq!(node.str_prop("title"), Some("GP"));
        assert_eq!(node.str_prop("name"), None);
    }

    #[test]
    fn test_set_single_edge_keeps_one_outgoing_edge() {
        let mut g = sample();
        let p1 = NodeRef::new(Label::Patient, "P1");
        let d1 = NodeRef::new(Label::Doctor, "D1");
        let d2 = NodeRef::new(Label::Doctor, "D2");

        g.set_single_edge(&p1, RelType::AssignedTo, &d1).unwrap();
        g.set_single_edge(&p1, RelType::AssignedTo, &d2).unwrap();

        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.target(&p1, RelType::AssignedTo).unwrap().key, "D2");
        assert!(g.sources(&d1, RelType::AssignedTo).is_empty());
        assert_eq!(g.sources(&d2, RelType::AssignedTo).len(), 1);
    }

    #[test]
    fn test_set_single_edge_to_missing_node_changes_nothing() {
        let mut g = sample();
        let p1 = NodeRef::new(Label::Patient, "P1");
        let d1 = NodeRef::new(Label::Doctor, "D1");
        g.set_single_edge(&p1, RelType::AssignedTo, &d1).unwrap();
        let before = g.clone();

        let err = g
            .set_single_edge(&p1, RelType::AssignedTo, &NodeRef::new(Label::Doctor, "D9"))
            .unwrap_err();

        assert!(matches!(err, ClinicError::NotFound(_)));
        assert_eq!(g, before);
    }

    #[test]
    fn test_detach_delete_removes_incident_edges() {
        let mut g = sample();
        let p1 = NodeRef::new(Label::Patient, "P1");
        let d1 = NodeRef::new(Label::Doctor, "D1");
        g.set_single_edge(&p1, RelType::AssignedTo, &d1).unwrap();

        g.detach_delete(&d1).unwrap();

        assert!(!g.contains(&d1));
        assert_eq!(g.edge_count(), 0);
        assert!(g.target(&p1, RelType::AssignedTo).is_none());
        assert!(matches!(g.detach_delete(&d1), Err(ClinicError::NotFound(_))));
    }

    #[test]
    fn test_rekey_node_moves_edges() {
        let mut g = sample();
        let p1 = NodeRef::new(Label::Patient, "P1");
        let d1 = NodeRef::new(Label::Doctor, "D1");
        g.set_single_edge(&p1, RelType::AssignedTo, &d1).unwrap();

        g.rekey_node(&d1, "D7").unwrap();

        assert!(!g.contains(&d1));
        assert_eq!(g.target(&p1, RelType::AssignedTo).unwrap().key, "D7");
        assert!(g.rekey_node(&NodeRef::new(Label::Doctor, "D7"), "D2").is_err());
    }

    #[test]
    fn test_increment_counter_starts_from_zero() {
        let mut g = GraphData::default();
        let counters = NodeRef::new(Label::Counters, "global");
        g.create_node(Label::Counters, "global", Map::new()).unwrap();

        assert_eq!(g.increment_counter(&counters, "lo_oid").unwrap(), 1);
        assert_eq!(g.increment_counter(&counters, "lo_oid").unwrap(), 2);
        assert_eq!(g.node(&counters).unwrap().int_prop("lo_oid"), Some(2));
    }

    #[test]
    fn test_serialization_is_flat_and_drops_dangling_edges() {
        let mut g = sample();
        let p1 = NodeRef::new(Label::Patient, "P1");
        g.set_single_edge(&p1, RelType::AssignedTo, &NodeRef::new(Label::Doctor, "D1"))
            .unwrap();

        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(json["edges"][0]["rel"], "ASSIGNED_TO");

        let mut dangling = json.clone();
        dangling["edges"][0]["to"]["key"] = json!("D404");
        let restored: GraphData = serde_json::from_value(dangling).unwrap();
        assert_eq!(restored.edge_count(), 0);

        let back: GraphData = serde_json::from_value(json).unwrap();
        assert_eq!(back, g);
    }
}
