// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Record → structure tree canonicalization.
//!
//! A record is a mapping with an `archetype` class label and an `ehr_data`
//! mapping of named fields. Fields whose value is itself a mapping carrying an
//! `archetype` key are sub-archetypes and become child nodes; every other
//! field is leaf data and is dropped.
//!
//! Children follow the iteration order of `ehr_data` (insertion order, since
//! `serde_json` is built with `preserve_order`). Nothing is sorted, so two
//! records listing the same sub-archetypes in a different order produce
//! different structures.

use serde_json::{Map, Value};

use crate::error::IndexError;
use crate::model::StructureNode;

/// Key holding the archetype class label.
pub const ARCHETYPE_KEY: &str = "archetype";
/// Key holding the record's named fields.
pub const EHR_DATA_KEY: &str = "ehr_data";

/// Reduce `record` to its archetype nesting skeleton.
///
/// # Errors
///
/// [`IndexError::InvalidStructure`] when the record (or one of its
/// sub-archetypes) is not a mapping, lacks a non-empty string `archetype`, or
/// lacks an `ehr_data` mapping.
pub fn canonicalize(record: &Value) -> Result<StructureNode, IndexError> {
    canonicalize_at(record, "")
}

/// Returns `true` if `value` is a mapping with an `archetype` key.
pub fn is_archetype(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|fields| fields.contains_key(ARCHETYPE_KEY))
}

fn canonicalize_at(record: &Value, path: &str) -> Result<StructureNode, IndexError> {
    let fields = record.as_object().ok_or_else(|| {
        IndexError::invalid_structure(display_path(path), "expected a mapping")
    })?;
    let class = class_label(fields, path)?;
    let data = ehr_data(fields, path)?;

    let mut node = StructureNode::new(class);
    for (name, value) in data {
        if is_archetype(value) {
            let child_path = join(&join(path, EHR_DATA_KEY), name);
            node.push(canonicalize_at(value, &child_path)?);
        }
    }
    Ok(node)
}

fn class_label<'a>(fields: &'a Map<String, Value>, path: &str) -> Result<&'a str, IndexError> {
    let at = join(path, ARCHETYPE_KEY);
    match fields.get(ARCHETYPE_KEY) {
        Some(Value::String(class)) if !class.trim().is_empty() => Ok(class),
        Some(Value::String(_)) => Err(IndexError::invalid_structure(at, "empty class label")),
        Some(_) => Err(IndexError::invalid_structure(at, "class label must be a string")),
        None => Err(IndexError::invalid_structure(at, "missing class label")),
    }
}

fn ehr_data<'a>(
    fields: &'a Map<String, Value>,
    path: &str,
) -> Result<&'a Map<String, Value>, IndexError> {
    let at = join(path, EHR_DATA_KEY);
    match fields.get(EHR_DATA_KEY) {
        Some(Value::Object(data)) => Ok(data),
        Some(_) => Err(IndexError::invalid_structure(at, "expected a mapping")),
        None => Err(IndexError::invalid_structure(at, "missing field data")),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_owned()
    } else {
        path.to_owned()
    }
}
