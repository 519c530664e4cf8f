// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for indexing operations and store adapters.

/// Failures reported by a [`StructureStore`](crate::StructureStore) adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Transport or connection failure.
    #[error("connection error: {0}")]
    Connection(String),
    /// The requested collection does not exist.
    #[error("scope not found: {0}")]
    ScopeNotFound(String),
    /// Stored data could not be decoded.
    #[error("corrupt store data: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the index.
///
/// Input problems ([`InvalidStructure`](IndexError::InvalidStructure),
/// [`InvalidQuery`](IndexError::InvalidQuery)) are raised before any store
/// interaction. Store problems are passed through from [`StoreError`] one to
/// one; the index never retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// The input record is not a well-formed archetype tree.
    #[error("[INVALID_STRUCTURE] at `{path}`: {reason}")]
    InvalidStructure {
        /// Dotted field path where the problem was found.
        path: String,
        /// What was wrong.
        reason: String,
    },
    /// The containment chain cannot be turned into a query.
    #[error("[INVALID_QUERY] {0}")]
    InvalidQuery(String),
    /// The store could not be reached.
    #[error("[STORE_UNAVAILABLE] {0}")]
    StoreUnavailable(String),
    /// The target collection does not exist.
    #[error("[SCOPE_NOT_FOUND] {0}")]
    ScopeNotFound(String),
    /// The store returned data the index cannot interpret.
    #[error("[STORE_CORRUPT] {0}")]
    StoreCorrupt(String),
}

impl IndexError {
    pub(crate) fn invalid_structure(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStructure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors caused by the caller's input rather than the store.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidStructure { .. } | Self::InvalidQuery(_))
    }
}

impl From<StoreError> for IndexError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection(msg) => Self::StoreUnavailable(msg),
            StoreError::ScopeNotFound(scope) => Self::ScopeNotFound(scope),
            StoreError::Corrupt(msg) => Self::StoreCorrupt(msg),
        }
    }
}
