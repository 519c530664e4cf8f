// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structure trees, their identifiers, and containment chain links.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::hash::structure_hash;

/// One structural layer of a record: an archetype class and the archetypes
/// nested directly inside it.
///
/// Children keep the order the canonicalizer produced them in. Two trees with
/// the same children in a different order are different structures.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructureNode {
    /// Archetype class label (e.g. `openEHR-EHR-OBSERVATION.blood_pressure.v1`).
    #[serde(rename = "class")]
    pub archetype_class: String,
    /// Directly nested archetypes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StructureNode>,
}

impl StructureNode {
    /// Create a leaf node for `archetype_class`.
    pub fn new(archetype_class: impl Into<String>) -> Self {
        Self {
            archetype_class: archetype_class.into(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`push`](StructureNode::push).
    pub fn with_child(mut self, child: StructureNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append a nested archetype.
    pub fn push(&mut self, child: StructureNode) {
        self.children.push(child);
    }

    /// Total number of nodes in the tree, root included.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Number of layers from the root to the deepest leaf (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Self::depth).max().unwrap_or(0)
    }

    /// Preorder walk over the tree.
    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }
}

/// Preorder iterator returned by [`StructureNode::iter`].
#[derive(Debug)]
pub struct Preorder<'a> {
    stack: Vec<&'a StructureNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a StructureNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A 32-byte BLAKE3 digest of a structure's canonical bytes.
///
/// `Display` and the serde form are lowercase hex.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StructureHash(pub [u8; 32]);

impl fmt::Display for StructureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for StructureHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for StructureHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StructureHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Opaque identifier assigned once per distinct structure.
///
/// Backed by a random (v4) UUID; rendered as 32 hex chars without hyphens.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StructureUid(Uuid);

impl StructureUid {
    /// Draw a fresh random uid.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StructureUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for StructureUid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Serialize for StructureUid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StructureUid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Structure-id facet attached to every stored structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructureId {
    /// Digest of the structure tree.
    pub hash: StructureHash,
    /// Identifier handed out to callers.
    pub uid: StructureUid,
}

/// A stored structure document: the skeleton plus its metadata facets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRecord {
    /// The canonical structure tree.
    pub structure: StructureNode,
    /// Number of source records registered against this structure (≥ 1).
    pub reference_count: u64,
    /// Hash and uid of the structure.
    pub structure_id: StructureId,
}

impl StructureRecord {
    /// Build a first-encounter record: `reference_count = 1` and a fresh uid.
    pub fn new(structure: StructureNode) -> Self {
        let hash = structure_hash(&structure);
        Self::with_hash(structure, hash)
    }

    // `hash` must be `structure_hash(&structure)`.
    pub(crate) fn with_hash(structure: StructureNode, hash: StructureHash) -> Self {
        Self {
            structure,
            reference_count: 1,
            structure_id: StructureId {
                hash,
                uid: StructureUid::new_random(),
            },
        }
    }

    /// Recompute the hash of the structure tree alone.
    pub fn structure_hash(&self) -> StructureHash {
        structure_hash(&self.structure)
    }

    /// Returns `true` if the stored hash matches the tree.
    pub fn is_consistent(&self) -> bool {
        self.structure_hash() == self.structure_id.hash
    }
}

/// Archetype-class constraint carried by a containment link.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchetypePredicate {
    /// Archetype class the link must match.
    pub archetype_id: String,
}

/// One link of a containment chain. `predicate: None` matches any archetype.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainmentContainer {
    /// Optional class constraint.
    pub predicate: Option<ArchetypePredicate>,
}

impl ContainmentContainer {
    /// A link matching any archetype node.
    pub fn any() -> Self {
        Self { predicate: None }
    }

    /// A link matching nodes of `archetype_id`.
    pub fn of_class(archetype_id: impl Into<String>) -> Self {
        Self {
            predicate: Some(ArchetypePredicate {
                archetype_id: archetype_id.into(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> StructureNode {
        StructureNode::new("Visit")
            .with_child(StructureNode::new("Person").with_child(StructureNode::new("Address")))
            .with_child(StructureNode::new("Vitals"))
    }

    #[test]
    fn preorder_visits_parents_before_children() {
        let tree = sample();
        let classes: Vec<_> = tree.iter().map(|n| n.archetype_class.as_str()).collect();
        assert_eq!(classes, ["Visit", "Person", "Address", "Vitals"]);
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn new_record_starts_with_one_reference() {
        let record = StructureRecord::new(sample());
        assert_eq!(record.reference_count, 1);
        assert!(record.is_consistent());
    }

    #[test]
    fn fresh_records_get_distinct_uids() {
        let a = StructureRecord::new(sample());
        let b = StructureRecord::new(sample());
        assert_eq!(a.structure_id.hash, b.structure_id.hash);
        assert_ne!(a.structure_id.uid, b.structure_id.uid);
    }

    #[test]
    fn uid_renders_as_plain_hex() {
        let uid = StructureUid::new_random();
        let text = uid.to_string();
        assert_eq!(text.len(), 32);
        assert!(!text.contains('-'));
        assert_eq!(text.parse::<StructureUid>().unwrap(), uid);
    }

    #[test]
    fn hash_parses_its_own_display() {
        let hash = structure_hash(&sample());
        assert_eq!(hash.to_string().parse::<StructureHash>().unwrap(), hash);
        assert!("abc".parse::<StructureHash>().is_err());
    }

    #[test]
    fn record_serde_uses_hex_ids() {
        let record = StructureRecord::new(sample());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json["structure_id"]["hash"],
            serde_json::Value::String(record.structure_id.hash.to_string())
        );
        assert_eq!(json["structure"]["class"], "Visit");
        let back: StructureRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
