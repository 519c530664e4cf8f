// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structure Store contract.
//!
//! The index reaches persistence only through these traits. A
//! [`StructureStore`] is a connector; [`StructureStore::open`] yields a
//! [`StoreSession`] that lives for one index operation and is consumed by
//! [`StoreSession::close`].
//!
//! # Absence Semantics
//!
//! [`find_by_hash`](StoreSession::find_by_hash) returns `None` for an unknown
//! hash. That is **not** an error. Error variants are reserved for transport
//! failures, missing scopes, and undecodable data.
//!
//! # Document Anchoring
//!
//! Hash lookups and path queries only ever consider the `structure_id` facet
//! of a stored document's root. A sub-tree of a stored structure is never
//! treated as a document of its own.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::containment::PathExpr;
use crate::error::StoreError;
use crate::model::{StructureHash, StructureId, StructureRecord};

/// Name of a structure collection inside a store.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreScope(String);

impl StoreScope {
    /// Wrap a collection name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The collection name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreScope {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// User/password pair handed to the store on open.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub user: String,
    /// Account secret.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and as whom to open a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTarget {
    /// Adapter-specific address (host:port, directory, ...).
    pub endpoint: String,
    /// Optional login.
    pub credentials: Option<Credentials>,
}

impl StoreTarget {
    /// Target `endpoint` without credentials.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials: None,
        }
    }

    /// Attach credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }
}

/// Result of [`StoreSession::insert_if_absent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was appended.
    Inserted,
    /// A record with the same hash already existed; nothing was written.
    Existing(StructureRecord),
}

/// Connector that opens sessions against a structure store.
pub trait StructureStore {
    /// Session type produced by [`open`](StructureStore::open).
    type Session: StoreSession;

    /// Open a session. Fails with [`StoreError::Connection`] if the store is
    /// unreachable.
    fn open(&self, target: &StoreTarget) -> Result<Self::Session, StoreError>;
}

/// One live session against a store.
pub trait StoreSession {
    /// First top-level record whose `structure_id.hash == hash`.
    fn find_by_hash(
        &mut self,
        scope: &StoreScope,
        hash: &StructureHash,
    ) -> Result<Option<StructureRecord>, StoreError>;

    /// Structure-id facets selected by `path`, in store order.
    fn find_by_path(
        &mut self,
        scope: &StoreScope,
        path: &PathExpr,
    ) -> Result<Vec<StructureId>, StoreError>;

    /// Append `record` unconditionally.
    fn insert(&mut self, scope: &StoreScope, record: StructureRecord) -> Result<(), StoreError>;

    /// Append `record` unless a record with the same hash exists, as one
    /// atomic step with respect to every other session on the same store.
    fn insert_if_absent(
        &mut self,
        scope: &StoreScope,
        record: StructureRecord,
    ) -> Result<InsertOutcome, StoreError>;

    /// Atomically increment the reference count of the record stored under
    /// `hash` and return the new count.
    fn add_reference(&mut self, scope: &StoreScope, hash: &StructureHash)
        -> Result<u64, StoreError>;

    /// Every record in `scope`, in store order.
    fn records(&mut self, scope: &StoreScope) -> Result<Vec<StructureRecord>, StoreError>;

    /// Release the session.
    fn close(self) -> Result<(), StoreError>
    where
        Self: Sized;
}
