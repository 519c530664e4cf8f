// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Containment chain → hierarchical path query.
//!
//! A chain `[c0, c1, ..., cn]` reads "c0 contains c1 contains ... cn". Each
//! link becomes one [`PathSegment`]; segment `i + 1` must match a strict
//! descendant of the node matched by segment `i`. The first segment is
//! anchored at the document root. The terminal step walks from the innermost
//! match back up to the structure-id facet of the document root.
//!
//! Rendered in XPath form, `[Visit, Person, *]` over scope `path_index` reads:
//!
//! ```text
//! collection("path_index")/archetype[@class="Visit"]//archetype[@class="Person"]//archetype/ancestor-or-self::archetype/structure_id
//! ```

use std::collections::BTreeSet;
use std::fmt;

use crate::error::IndexError;
use crate::model::{ContainmentContainer, StructureId, StructureNode, StructureUid};
use crate::store::StoreScope;

/// Step selecting the document's structure-id facet from the innermost match.
pub const TERMINAL_STEP: &str = "ancestor-or-self::archetype/structure_id";

/// Node test for one containment link.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Any archetype node (`archetype`).
    Any,
    /// Archetype nodes of one class (`archetype[@class="X"]`).
    Class(String),
}

impl PathSegment {
    /// Whether `node` passes this segment's node test.
    pub fn matches(&self, node: &StructureNode) -> bool {
        match self {
            Self::Any => true,
            Self::Class(class) => node.archetype_class == *class,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("archetype"),
            Self::Class(class) => write!(f, "archetype[@class={}]", string_literal(class)),
        }
    }
}

/// A containment query over the structures of one scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathExpr {
    scope: StoreScope,
    segments: Vec<PathSegment>,
}

impl PathExpr {
    /// Build a query from explicit segments. Rejects an empty segment list.
    pub fn new(scope: StoreScope, segments: Vec<PathSegment>) -> Result<Self, IndexError> {
        if segments.is_empty() {
            return Err(IndexError::InvalidQuery(
                "containment chain must have at least one container".into(),
            ));
        }
        Ok(Self { scope, segments })
    }

    /// Collection the query runs against.
    pub fn scope(&self) -> &StoreScope {
        &self.scope
    }

    /// Segments, outermost first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether the document rooted at `root` yields its structure id for this
    /// query.
    pub fn matches(&self, root: &StructureNode) -> bool {
        chain_matches(std::iter::once(root), &self.segments)
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collection({})", string_literal(self.scope.as_str()))?;
        for (idx, segment) in self.segments.iter().enumerate() {
            let axis = if idx == 0 { "/" } else { "//" };
            write!(f, "{axis}{segment}")?;
        }
        write!(f, "/{TERMINAL_STEP}")
    }
}

// Some node in `candidates` passes `segments[0]` and has strict descendants
// satisfying the rest of the chain.
fn chain_matches<'a>(
    candidates: impl Iterator<Item = &'a StructureNode>,
    segments: &[PathSegment],
) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return true;
    };
    candidates
        .filter(|node| first.matches(node))
        .any(|node| chain_matches(node.children.iter().flat_map(StructureNode::iter), rest))
}

// XPath string literal; embedded quotes are doubled.
fn string_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Translate `containers` (outermost first) into a query over `scope`.
///
/// # Errors
///
/// [`IndexError::InvalidQuery`] for an empty chain or a predicate with an
/// empty archetype id.
pub fn build_query(
    scope: &StoreScope,
    containers: &[ContainmentContainer],
) -> Result<PathExpr, IndexError> {
    let segments = containers
        .iter()
        .enumerate()
        .map(|(idx, container)| segment_for(idx, container))
        .collect::<Result<Vec<_>, _>>()?;
    PathExpr::new(scope.clone(), segments)
}

fn segment_for(idx: usize, container: &ContainmentContainer) -> Result<PathSegment, IndexError> {
    match &container.predicate {
        None => Ok(PathSegment::Any),
        Some(predicate) if predicate.archetype_id.trim().is_empty() => Err(
            IndexError::InvalidQuery(format!("container {idx} has an empty archetype id")),
        ),
        Some(predicate) => Ok(PathSegment::Class(predicate.archetype_id.clone())),
    }
}

/// Collapse matched structure-id facets into the set of their uids.
pub fn extract_ids<I>(facets: I) -> BTreeSet<StructureUid>
where
    I: IntoIterator<Item = StructureId>,
{
    facets.into_iter().map(|facet| facet.uid).collect()
}
