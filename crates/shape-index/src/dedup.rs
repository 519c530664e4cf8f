// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lookup-or-register of structure ids.
//!
//! One uid per distinct structure hash. The lookup is an optimistic read; the
//! registration goes through [`StoreSession::insert_if_absent`], which decides
//! the winner atomically when two writers race on the same novel structure.
//! The loser adopts the winner's uid.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::IndexError;
use crate::hash::structure_hash;
use crate::model::{StructureHash, StructureNode, StructureRecord, StructureUid};
use crate::store::{InsertOutcome, StoreScope, StoreSession};

/// What happens to `reference_count` when a known structure is seen again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
    /// Increment the stored count on every repeat encounter.
    #[default]
    Counted,
    /// Leave the count at 1; repeat lookups are read-only.
    Fixed,
}

/// Return the uid registered for `node`'s structure, registering it first if
/// the store has never seen it.
///
/// # Errors
///
/// [`IndexError::InvalidStructure`] if any node has an empty class label
/// (checked before `session` is touched); store failures otherwise.
pub fn get_or_create<S: StoreSession>(
    session: &mut S,
    scope: &StoreScope,
    node: &StructureNode,
    policy: ReferencePolicy,
) -> Result<StructureUid, IndexError> {
    validate_structure(node)?;
    let hash = structure_hash(node);
    debug!(%hash, nodes = node.node_count(), "looking up structure");

    if let Some(existing) = session.find_by_hash(scope, &hash)? {
        let uid = existing.structure_id.uid;
        debug!(%hash, %uid, "structure already registered");
        note_reference(session, scope, &hash, policy)?;
        return Ok(uid);
    }

    let record = StructureRecord::with_hash(node.clone(), hash);
    let uid = record.structure_id.uid;
    match session.insert_if_absent(scope, record)? {
        InsertOutcome::Inserted => {
            info!(%hash, %uid, root = %node.archetype_class, "registered new structure");
            Ok(uid)
        }
        InsertOutcome::Existing(winner) => {
            let uid = winner.structure_id.uid;
            warn!(%hash, %uid, "structure registered concurrently; adopting existing uid");
            note_reference(session, scope, &hash, policy)?;
            Ok(uid)
        }
    }
}

fn note_reference<S: StoreSession>(
    session: &mut S,
    scope: &StoreScope,
    hash: &StructureHash,
    policy: ReferencePolicy,
) -> Result<(), IndexError> {
    if policy == ReferencePolicy::Counted {
        let count = session.add_reference(scope, hash)?;
        debug!(%hash, count, "reference count bumped");
    }
    Ok(())
}

/// Check that every node of `node` carries a class label.
pub fn validate_structure(node: &StructureNode) -> Result<(), IndexError> {
    validate(node, "class")
}

fn validate(node: &StructureNode, path: &str) -> Result<(), IndexError> {
    if node.archetype_class.trim().is_empty() {
        return Err(IndexError::invalid_structure(path, "missing class label"));
    }
    for (idx, child) in node.children.iter().enumerate() {
        validate(child, &format!("{}children[{idx}].class", parent_prefix(path)))?;
    }
    Ok(())
}

// "children[0].class" -> "children[0]."
fn parent_prefix(path: &str) -> &str {
    path.strip_suffix("class").unwrap_or(path)
}
