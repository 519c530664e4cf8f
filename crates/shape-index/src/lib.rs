// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structure-shape index for archetype-based clinical records.
//!
//! A clinical record is a tree of nested archetypes. `shape-index` strips the
//! leaf data from a record, keeps the archetype nesting skeleton
//! ([`StructureNode`]), hashes it with BLAKE3 and registers one
//! [`StructureRecord`] per distinct skeleton in a [`StructureStore`]. Records
//! with the same skeleton share a [`StructureUid`].
//!
//! The read side translates a parsed containment chain
//! (`[ContainmentContainer]`, outermost first) into a [`PathExpr`] over the
//! stored skeletons and returns the uids of every structure that satisfies it.
//!
//! # Hash Domain Policy
//!
//! The structure hash covers the skeleton only: archetype class labels and
//! their nesting, serialized by [`canonical_bytes`]. The `reference_count` and
//! `structure_id` facets of a stored record never feed the digest.
//!
//! # Session Scoping
//!
//! [`StructureIndex`] holds no live connection. Every public operation opens
//! one store session after its input has been validated and closes it before
//! returning.
#![forbid(unsafe_code)]

pub mod canonical;
pub mod containment;
pub mod dedup;
mod error;
pub mod hash;
pub mod memory;
mod model;
pub mod service;
pub mod store;

pub use canonical::canonicalize;
pub use containment::{build_query, extract_ids, PathExpr, PathSegment};
pub use dedup::{get_or_create, ReferencePolicy};
pub use error::{IndexError, StoreError};
pub use hash::{canonical_bytes, structure_hash};
pub use memory::MemoryStore;
pub use model::{
    ArchetypePredicate, ContainmentContainer, Preorder, StructureHash, StructureId,
    StructureNode, StructureRecord, StructureUid,
};
pub use service::StructureIndex;
pub use store::{Credentials, InsertOutcome, StoreScope, StoreSession, StoreTarget, StructureStore};
