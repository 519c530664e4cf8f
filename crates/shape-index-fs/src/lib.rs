// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Directory-backed `StructureStore` for shape-index tools.
//!
//! The target endpoint is a directory; each scope is `<dir>/<scope>.json`, a
//! JSON array of structure records. Every read-modify-write holds an exclusive
//! OS lock on `<dir>/<scope>.json.lock`, so `insert_if_absent` and
//! `add_reference` are atomic across threads and processes. Writes go to a
//! uniquely named temp file in the same directory and are renamed over the
//! scope file, so readers never see a partial file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use shape_index::{
    InsertOutcome, PathExpr, StoreError, StoreScope, StoreSession, StoreTarget, StructureHash,
    StructureId, StructureRecord, StructureStore,
};
use tempfile::NamedTempFile;
use tracing::debug;

/// Connector opening sessions on a structure directory.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirStore;

impl DirStore {
    /// Create an empty collection for `scope` under `target`'s directory.
    /// Returns `false` if the scope already existed.
    pub fn create_scope(&self, target: &StoreTarget, scope: &StoreScope) -> Result<bool, StoreError> {
        let session = self.open(target)?;
        let path = session.scope_path(scope)?;
        let _lock = lock_scope(&path)?;
        if path.exists() {
            return Ok(false);
        }
        session.save(scope, &[])?;
        debug!(scope = %scope, path = %path.display(), "created scope");
        Ok(true)
    }
}

impl StructureStore for DirStore {
    type Session = DirSession;

    fn open(&self, target: &StoreTarget) -> Result<DirSession, StoreError> {
        let dir = PathBuf::from(&target.endpoint);
        if !dir.is_dir() {
            return Err(StoreError::Connection(format!(
                "store directory `{}` does not exist",
                dir.display()
            )));
        }
        debug!(dir = %dir.display(), "dir session opened");
        Ok(DirSession { dir })
    }
}

/// Session over one store directory.
#[derive(Debug)]
pub struct DirSession {
    dir: PathBuf,
}

impl DirSession {
    fn scope_path(&self, scope: &StoreScope) -> Result<PathBuf, StoreError> {
        let name = scope.as_str();
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StoreError::ScopeNotFound(name.to_owned()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    fn load(&self, scope: &StoreScope) -> Result<Vec<StructureRecord>, StoreError> {
        let path = self.scope_path(scope)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::ScopeNotFound(scope.to_string()));
            }
            Err(err) => return Err(io_error(&path, &err)),
        };
        serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::Corrupt(format!("{}: {err}", path.display())))
    }

    fn save(&self, scope: &StoreScope, records: &[StructureRecord]) -> Result<(), StoreError> {
        let path = self.scope_path(scope)?;
        let data = serde_json::to_vec_pretty(records)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|err| io_error(&self.dir, &err))?;
        tmp.write_all(&data)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|err| io_error(tmp.path(), &err))?;
        tmp.persist(&path)
            .map_err(|err| io_error(&path, &err.error))?;
        Ok(())
    }

    fn modify<T>(
        &self,
        scope: &StoreScope,
        f: impl FnOnce(&mut Vec<StructureRecord>) -> Option<T>,
    ) -> Result<Option<T>, StoreError> {
        let path = self.scope_path(scope)?;
        if !path.is_file() {
            return Err(StoreError::ScopeNotFound(scope.to_string()));
        }
        let _lock = lock_scope(&path)?;
        let mut records = self.load(scope)?;
        let out = f(&mut records);
        if out.is_some() {
            self.save(scope, &records)?;
        }
        Ok(out)
    }
}

impl StoreSession for DirSession {
    fn find_by_hash(
        &mut self,
        scope: &StoreScope,
        hash: &StructureHash,
    ) -> Result<Option<StructureRecord>, StoreError> {
        Ok(self
            .load(scope)?
            .into_iter()
            .find(|r| r.structure_id.hash == *hash))
    }

    fn find_by_path(
        &mut self,
        scope: &StoreScope,
        path: &PathExpr,
    ) -> Result<Vec<StructureId>, StoreError> {
        Ok(self
            .load(scope)?
            .iter()
            .filter(|r| path.matches(&r.structure))
            .map(|r| r.structure_id)
            .collect())
    }

    fn insert(&mut self, scope: &StoreScope, record: StructureRecord) -> Result<(), StoreError> {
        self.modify(scope, |records| {
            records.push(record);
            Some(())
        })?;
        Ok(())
    }

    fn insert_if_absent(
        &mut self,
        scope: &StoreScope,
        record: StructureRecord,
    ) -> Result<InsertOutcome, StoreError> {
        let mut existing = None;
        self.modify(scope, |records| {
            let hash = record.structure_id.hash;
            if let Some(found) = records.iter().find(|r| r.structure_id.hash == hash) {
                existing = Some(found.clone());
                return None;
            }
            records.push(record);
            Some(())
        })?;
        Ok(existing.map_or(InsertOutcome::Inserted, InsertOutcome::Existing))
    }

    fn add_reference(
        &mut self,
        scope: &StoreScope,
        hash: &StructureHash,
    ) -> Result<u64, StoreError> {
        self.modify(scope, |records| {
            let record = records.iter_mut().find(|r| r.structure_id.hash == *hash)?;
            record.reference_count += 1;
            Some(record.reference_count)
        })?
        .ok_or_else(|| StoreError::Corrupt(format!("no structure stored under {hash}")))
    }

    fn records(&mut self, scope: &StoreScope) -> Result<Vec<StructureRecord>, StoreError> {
        self.load(scope)
    }

    fn close(self) -> Result<(), StoreError> {
        debug!(dir = %self.dir.display(), "dir session closed");
        Ok(())
    }
}

// Exclusive lock on the scope's lock file, held until the returned file is dropped.
fn lock_scope(scope_file: &Path) -> Result<File, StoreError> {
    let lock_path = scope_file.with_extension("json.lock");
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|err| io_error(&lock_path, &err))?;
    file.lock().map_err(|err| io_error(&lock_path, &err))?;
    Ok(file)
}

fn io_error(path: &Path, err: &io::Error) -> StoreError {
    StoreError::Connection(format!("{}: {err}", path.display()))
}
