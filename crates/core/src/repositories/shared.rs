//! Shared repository utilities.
//!
//! Helpers used by every entity repository: linked-node lookups, search predicates, and the
//! conversion of patch fields into graph property updates.

use crate::graph::{GraphData, Label, Node, NodeRef, RelType};
use crate::validation::DateParts;
use crate::{ClinicError, ClinicResult};
use clinic_types::EntityId;
use serde_json::{Map, Value};

/// Property names of a date stored as three optional integer parts.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DateFields {
    pub year: &'static str,
    pub month: &'static str,
    pub day: &'static str,
}

impl DateFields {
    /// Reads the stored parts from `node`.
    pub fn read(&self, node: &Node) -> DateParts {
        DateParts::new(
            node.int_prop(self.year),
            node.int_prop(self.month),
            node.int_prop(self.day),
        )
    }

    /// Writes every part of `parts` into `props`; absent parts become `null` (removed).
    pub fn write(&self, parts: &DateParts, props: &mut Map<String, Value>) {
        props.insert(self.year.into(), parts.year.map_or(Value::Null, Value::from));
        props.insert(self.month.into(), parts.month.map_or(Value::Null, Value::from));
        props.insert(self.day.into(), parts.day.map_or(Value::Null, Value::from));
    }
}

/// Looks up a required node.
pub(crate) fn require_node<'g>(g: &'g GraphData, label: Label, key: &str) -> ClinicResult<&'g Node> {
    g.require(&NodeRef::new(label, key))
}

/// Resolves an optional link target, failing with `NotFound` when it is set but missing.
pub(crate) fn link_target(
    g: &GraphData,
    label: Label,
    key: Option<&EntityId>,
) -> ClinicResult<Option<NodeRef>> {
    key.map(|k| require_node(g, label, k.as_str()).map(Node::node_ref))
        .transpose()
}

/// Points `from`'s single `rel` edge at `to`, when a target was given.
pub(crate) fn relink(
    g: &mut GraphData,
    from: &NodeRef,
    rel: RelType,
    to: Option<&NodeRef>,
) -> ClinicResult<()> {
    match to {
        Some(to) => g.set_single_edge(from, rel, to),
        None => Ok(()),
    }
}

/// Value for an optional text property: blank text clears the property.
pub(crate) fn optional_text(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Value::Null
    } else {
        Value::from(trimmed)
    }
}

/// Resolves an optional attachment handle to its blob node.
pub(crate) fn blob_target(g: &GraphData, handle: Option<u64>) -> ClinicResult<Option<NodeRef>> {
    handle
        .map(|h| g.require(&blob_ref(h)).map(Node::node_ref))
        .transpose()
}

/// Handle of the blob linked from `node` by a `FILE` edge.
pub(crate) fn file_handle(g: &GraphData, node: &NodeRef) -> Option<u64> {
    g.target(node, RelType::File)
        .and_then(|blob| blob.key.parse().ok())
}

/// Blob node for an attachment handle.
pub(crate) fn blob_ref(handle: u64) -> NodeRef {
    NodeRef::new(Label::Blob, handle.to_string())
}

/// Substring filter. An unset or blank needle matches everything; a set needle never matches an
/// absent value.
pub(crate) fn contains(value: Option<&str>, needle: Option<&str>) -> bool {
    match needle.map(str::trim).filter(|n| !n.is_empty()) {
        None => true,
        Some(needle) => value.is_some_and(|v| v.contains(needle)),
    }
}

/// Equality filter for integer date parts.
pub(crate) fn equals(value: Option<i64>, wanted: Option<i64>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => value == Some(wanted),
    }
}

/// Orders optional values with absent values last.
pub(crate) fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Builds the `NotFound` error for an update or delete of an unknown id.
pub(crate) fn missing(label: Label, key: &EntityId) -> ClinicError {
    ClinicError::not_found(label.as_str(), key)
}
