// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Public index surface with per-operation store sessions.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, warn};

use crate::canonical::canonicalize;
use crate::containment::{build_query, extract_ids, PathExpr};
use crate::dedup::{get_or_create, validate_structure, ReferencePolicy};
use crate::error::IndexError;
use crate::model::{ContainmentContainer, StructureNode, StructureRecord, StructureUid};
use crate::store::{StoreScope, StoreSession, StoreTarget, StructureStore};

/// Structure index over one scope of a [`StructureStore`].
///
/// Holds the connector, never a session: each call below opens a session
/// after validating its input and closes it before returning. The index is
/// `Sync` whenever `S` is, so one instance can serve many threads; atomicity
/// of registration is delegated to [`StoreSession::insert_if_absent`].
pub struct StructureIndex<S> {
    store: S,
    target: StoreTarget,
    scope: StoreScope,
    policy: ReferencePolicy,
}

impl<S> StructureIndex<S> {
    /// Index `scope` of `store`, opening sessions against `target`.
    pub fn new(store: S, target: StoreTarget, scope: impl Into<StoreScope>) -> Self {
        Self {
            store,
            target,
            scope: scope.into(),
            policy: ReferencePolicy::default(),
        }
    }

    /// Set the reference counting policy.
    pub fn with_reference_policy(mut self, policy: ReferencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Scope this index reads and writes.
    pub fn scope(&self) -> &StoreScope {
        &self.scope
    }

    /// Active reference counting policy.
    pub fn reference_policy(&self) -> ReferencePolicy {
        self.policy
    }

    /// The underlying connector.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: StructureStore> StructureIndex<S> {
    /// Canonicalize `record` and return its structure's uid, registering the
    /// structure on first encounter.
    pub fn get_or_create_structure_id(&self, record: &Value) -> Result<StructureUid, IndexError> {
        let structure = canonicalize(record)?;
        self.register_structure(&structure)
    }

    /// Like [`get_or_create_structure_id`](Self::get_or_create_structure_id)
    /// for an already canonical tree.
    pub fn register_structure(&self, structure: &StructureNode) -> Result<StructureUid, IndexError> {
        validate_structure(structure)?;
        self.with_session(|session| get_or_create(session, &self.scope, structure, self.policy))
    }

    /// Translate `containers` into a query over this index's scope.
    pub fn build_query(&self, containers: &[ContainmentContainer]) -> Result<PathExpr, IndexError> {
        build_query(&self.scope, containers)
    }

    /// Uids of every stored structure satisfying the containment chain.
    pub fn get_matching_structure_ids(
        &self,
        containers: &[ContainmentContainer],
    ) -> Result<BTreeSet<StructureUid>, IndexError> {
        let query = self.build_query(containers)?;
        debug!(%query, "running containment query");
        let facets = self.with_session(|session| Ok(session.find_by_path(&self.scope, &query)?))?;
        let ids = extract_ids(facets);
        debug!(matches = ids.len(), "containment query done");
        Ok(ids)
    }

    /// Every stored structure in this index's scope.
    pub fn structures(&self) -> Result<Vec<StructureRecord>, IndexError> {
        self.with_session(|session| Ok(session.records(&self.scope)?))
    }

    fn with_session<T>(
        &self,
        op: impl FnOnce(&mut S::Session) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        let mut session = self.store.open(&self.target)?;
        let result = op(&mut session);
        match session.close() {
            Ok(()) => result,
            Err(err) => {
                warn!(error = %err, scope = %self.scope, "failed to close store session");
                result.and(Err(err.into()))
            }
        }
    }
}
