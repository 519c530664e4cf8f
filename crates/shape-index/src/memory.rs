// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory Structure Store.
//!
//! [`MemoryStore`] keeps every scope as a `Vec<StructureRecord>` behind one
//! mutex shared by all sessions, so [`insert_if_absent`] and
//! [`add_reference`] are atomic across threads. Cloning the store shares the
//! same state.
//!
//! [`insert_if_absent`]: crate::StoreSession::insert_if_absent
//! [`add_reference`]: crate::StoreSession::add_reference

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::containment::PathExpr;
use crate::error::StoreError;
use crate::model::{StructureHash, StructureId, StructureRecord};
use crate::store::{InsertOutcome, StoreScope, StoreSession, StoreTarget, StructureStore};

#[derive(Default)]
struct Shared {
    scopes: Mutex<BTreeMap<StoreScope, Vec<StructureRecord>>>,
    offline: AtomicBool,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Process-local structure store.
///
/// # Availability
///
/// [`set_available(false)`](MemoryStore::set_available) makes `open` and
/// every session call fail with [`StoreError::Connection`], standing in for a
/// dropped transport.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create a store with no scopes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding one empty scope.
    pub fn with_scope(scope: impl Into<StoreScope>) -> Self {
        let store = Self::new();
        store.create_scope(scope);
        store
    }

    /// Create `scope` if it does not exist yet.
    pub fn create_scope(&self, scope: impl Into<StoreScope>) {
        if let Ok(mut scopes) = self.shared.scopes.lock() {
            scopes.entry(scope.into()).or_default();
        }
    }

    /// Toggle simulated reachability.
    pub fn set_available(&self, available: bool) {
        self.shared.offline.store(!available, Ordering::SeqCst);
    }

    /// Snapshot of the records in `scope` (empty if the scope is missing).
    pub fn records(&self, scope: &StoreScope) -> Vec<StructureRecord> {
        self.shared
            .scopes
            .lock()
            .ok()
            .and_then(|scopes| scopes.get(scope).cloned())
            .unwrap_or_default()
    }

    /// Number of records in `scope`.
    pub fn record_count(&self, scope: &StoreScope) -> usize {
        self.records(scope).len()
    }

    /// Sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    pub fn sessions_closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl StructureStore for MemoryStore {
    type Session = MemorySession;

    fn open(&self, target: &StoreTarget) -> Result<MemorySession, StoreError> {
        if self.shared.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Connection(format!(
                "memory store at `{}` is offline",
                target.endpoint
            )));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        debug!(endpoint = %target.endpoint, "memory session opened");
        Ok(MemorySession {
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Session handed out by [`MemoryStore`].
pub struct MemorySession {
    shared: Arc<Shared>,
}

type Scopes = BTreeMap<StoreScope, Vec<StructureRecord>>;

impl MemorySession {
    fn lock(&self) -> Result<MutexGuard<'_, Scopes>, StoreError> {
        if self.shared.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store is offline".into()));
        }
        self.shared
            .scopes
            .lock()
            .map_err(|_| StoreError::Corrupt("memory store lock poisoned".into()))
    }

    fn with_scope<T>(
        &self,
        scope: &StoreScope,
        f: impl FnOnce(&mut Vec<StructureRecord>) -> T,
    ) -> Result<T, StoreError> {
        let mut scopes = self.lock()?;
        let records = scopes
            .get_mut(scope)
            .ok_or_else(|| StoreError::ScopeNotFound(scope.to_string()))?;
        Ok(f(records))
    }
}

impl StoreSession for MemorySession {
    fn find_by_hash(
        &mut self,
        scope: &StoreScope,
        hash: &StructureHash,
    ) -> Result<Option<StructureRecord>, StoreError> {
        self.with_scope(scope, |records| {
            records
                .iter()
                .find(|r| r.structure_id.hash == *hash)
                .cloned()
        })
    }

    fn find_by_path(
        &mut self,
        scope: &StoreScope,
        path: &PathExpr,
    ) -> Result<Vec<StructureId>, StoreError> {
        self.with_scope(scope, |records| {
            records
                .iter()
                .filter(|r| path.matches(&r.structure))
                .map(|r| r.structure_id)
                .collect()
        })
    }

    fn insert(&mut self, scope: &StoreScope, record: StructureRecord) -> Result<(), StoreError> {
        self.with_scope(scope, |records| records.push(record))
    }

    fn insert_if_absent(
        &mut self,
        scope: &StoreScope,
        record: StructureRecord,
    ) -> Result<InsertOutcome, StoreError> {
        self.with_scope(scope, |records| {
            let hash = record.structure_id.hash;
            if let Some(existing) = records.iter().find(|r| r.structure_id.hash == hash) {
                return InsertOutcome::Existing(existing.clone());
            }
            records.push(record);
            InsertOutcome::Inserted
        })
    }

    fn add_reference(
        &mut self,
        scope: &StoreScope,
        hash: &StructureHash,
    ) -> Result<u64, StoreError> {
        self.with_scope(scope, |records| {
            records
                .iter_mut()
                .find(|r| r.structure_id.hash == *hash)
                .map(|r| {
                    r.reference_count += 1;
                    r.reference_count
                })
        })?
        .ok_or_else(|| StoreError::Corrupt(format!("no structure stored under {hash}")))
    }

    fn records(&mut self, scope: &StoreScope) -> Result<Vec<StructureRecord>, StoreError> {
        self.with_scope(scope, |records| records.clone())
    }

    fn close(self) -> Result<(), StoreError> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        debug!("memory session closed");
        Ok(())
    }
}
