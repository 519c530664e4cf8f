// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical serialization and hashing of structure trees.
//!
//! The canonical form is compact XML: one `archetype` element per node with a
//! `class` attribute, children depth-first, leaves self-closing, no
//! whitespace. Attribute values are escaped so the byte form of two different
//! trees can never coincide.

use crate::model::{StructureHash, StructureNode};

/// Canonical byte form of `node`, e.g.
/// `<archetype class="Visit"><archetype class="Person"/></archetype>`.
pub fn canonical_bytes(node: &StructureNode) -> Vec<u8> {
    let mut out = Vec::with_capacity(node.node_count() * 32);
    write_node(node, &mut out);
    out
}

/// BLAKE3 digest of [`canonical_bytes`].
pub fn structure_hash(node: &StructureNode) -> StructureHash {
    let hash = blake3::hash(&canonical_bytes(node));
    StructureHash(*hash.as_bytes())
}

fn write_node(node: &StructureNode, out: &mut Vec<u8>) {
    out.extend_from_slice(b"<archetype class=\"");
    write_escaped(&node.archetype_class, out);
    if node.children.is_empty() {
        out.extend_from_slice(b"\"/>");
        return;
    }
    out.extend_from_slice(b"\">");
    for child in &node.children {
        write_node(child, out);
    }
    out.extend_from_slice(b"</archetype>");
}

fn write_escaped(value: &str, out: &mut Vec<u8>) {
    for byte in value.bytes() {
        match byte {
            b'&' => out.extend_from_slice(b"&amp;"),
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            b'"' => out.extend_from_slice(b"&quot;"),
            other => out.push(other),
        }
    }
}
