// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, missing_docs)]

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use shape_index::{canonicalize, structure_hash, StructureNode};

// Random archetype tree: class labels from a small alphabet so shapes collide
// often enough to be interesting.
fn arb_tree() -> impl Strategy<Value = StructureNode> {
    let leaf = "[A-E]".prop_map(StructureNode::new);
    leaf.prop_recursive(4, 24, 4, |inner| {
        ("[A-E]", prop::collection::vec(inner, 0..4)).prop_map(|(class, children)| {
            StructureNode {
                archetype_class: class,
                children,
            }
        })
    })
}

// Render `node` as a record, padding every layer with leaf fields derived
// from `noise`.
fn to_record(node: &StructureNode, noise: u32) -> Value {
    let mut data = Map::new();
    data.insert("note".into(), json!(format!("n{noise}")));
    for (idx, child) in node.children.iter().enumerate() {
        data.insert(format!("c{idx}"), to_record(child, noise.wrapping_add(1)));
        data.insert(format!("v{idx}"), json!(noise));
    }
    json!({"archetype": node.archetype_class, "ehr_data": Value::Object(data)})
}

proptest! {
    #[test]
    fn canonicalize_recovers_the_skeleton(tree in arb_tree(), noise in any::<u32>()) {
        let record = to_record(&tree, noise);
        prop_assert_eq!(canonicalize(&record).unwrap(), tree);
    }

    #[test]
    fn canonicalization_is_deterministic(tree in arb_tree(), noise in any::<u32>()) {
        let record = to_record(&tree, noise);
        let a = structure_hash(&canonicalize(&record).unwrap());
        let b = structure_hash(&canonicalize(&record).unwrap());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn leaf_data_never_reaches_the_hash(tree in arb_tree(), a in any::<u32>(), b in any::<u32>()) {
        let ha = structure_hash(&canonicalize(&to_record(&tree, a)).unwrap());
        let hb = structure_hash(&canonicalize(&to_record(&tree, b)).unwrap());
        prop_assert_eq!(ha, hb);
    }

    #[test]
    fn distinct_shapes_hash_apart(x in arb_tree(), y in arb_tree()) {
        prop_assume!(x != y);
        prop_assert_ne!(structure_hash(&x), structure_hash(&y));
    }
}
