// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Index settings service over a raw config storage port.
//!
//! [`SettingsService`] owns the JSON encoding of [`IndexSettings`]; a
//! [`ConfigStore`] only moves bytes under a key. An absent or empty entry
//! loads as [`IndexSettings::default`]; an entry that does not parse is a
//! [`ConfigError::Invalid`], never silently replaced by defaults.

use thiserror::Error;
use tracing::debug;

use crate::settings::{IndexSettings, SETTINGS_KEY};

/// Storage port for raw config blobs, keyed by logical name.
pub trait ConfigStore {
    /// Load the blob under `key`; [`ConfigError::NotFound`] when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist the blob under `key`.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Failures reading or writing index settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Nothing stored under the key.
    #[error("[CONFIG_NOT_FOUND] no config stored under `{0}`")]
    NotFound(String),
    /// The config directory could not be located.
    #[error("[CONFIG_UNAVAILABLE] {0}")]
    Unavailable(String),
    /// I/O failure inside the config directory.
    #[error("[CONFIG_IO] {0}")]
    Io(#[from] std::io::Error),
    /// Stored bytes are not valid settings.
    #[error("[CONFIG_INVALID] `{key}`: {source}")]
    Invalid {
        /// Key whose blob failed to parse.
        key: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
}

/// Loads and persists [`IndexSettings`] through a [`ConfigStore`].
pub struct SettingsService<S> {
    store: S,
    key: String,
}

impl<S: ConfigStore> SettingsService<S> {
    /// Settings under [`SETTINGS_KEY`].
    pub fn new(store: S) -> Self {
        Self::with_key(store, SETTINGS_KEY)
    }

    /// Settings under a custom key (one profile per key).
    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Key the settings live under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored settings, or defaults when nothing (or an empty blob) is stored.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for unparsable settings; store I/O errors.
    pub fn load(&self) -> Result<IndexSettings, ConfigError> {
        let bytes = match self.store.load_raw(&self.key) {
            Ok(bytes) => bytes,
            Err(ConfigError::NotFound(_)) => {
                debug!(key = %self.key, "no stored settings; using defaults");
                return Ok(IndexSettings::default());
            }
            Err(err) => return Err(err),
        };
        if bytes.is_empty() {
            return Ok(IndexSettings::default());
        }
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Invalid {
            key: self.key.clone(),
            source,
        })
    }

    /// Persist `settings` as pretty JSON.
    ///
    /// # Errors
    ///
    /// Store I/O errors.
    pub fn save(&self, settings: &IndexSettings) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(settings).map_err(|source| ConfigError::Invalid {
            key: self.key.clone(),
            source,
        })?;
        self.store.save_raw(&self.key, &data)?;
        debug!(key = %self.key, "settings saved");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shape_index::ReferencePolicy;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore(RefCell<HashMap<String, Vec<u8>>>);

    impl ConfigStore for MapStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.0
                .borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| ConfigError::NotFound(key.to_owned()))
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(key.to_owned(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn missing_and_empty_entries_load_defaults() {
        let svc = SettingsService::new(MapStore::default());
        assert_eq!(svc.load().unwrap(), IndexSettings::default());
        svc.store.save_raw(SETTINGS_KEY, b"").unwrap();
        assert_eq!(svc.load().unwrap(), IndexSettings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let svc = SettingsService::new(MapStore::default());
        let settings = IndexSettings {
            scope: "wards".into(),
            reference_policy: ReferencePolicy::Fixed,
            ..IndexSettings::default()
        };
        svc.save(&settings).unwrap();
        assert_eq!(svc.load().unwrap(), settings);
    }

    #[test]
    fn profiles_are_separate_keys() {
        let store = MapStore::default();
        store.save_raw("staging", br#"{"scope": "staging_index"}"#).unwrap();
        let svc = SettingsService::with_key(store, "staging");
        assert_eq!(svc.key(), "staging");
        assert_eq!(svc.load().unwrap().scope, "staging_index");
        assert!(svc.store.load_raw(SETTINGS_KEY).is_err());
    }

    #[test]
    fn garbage_is_invalid_not_defaults() {
        let svc = SettingsService::new(MapStore::default());
        svc.store.save_raw(SETTINGS_KEY, b"{").unwrap();
        let err = svc.load().unwrap_err();
        assert!(matches!(&err, ConfigError::Invalid { key, .. } if key == SETTINGS_KEY));
        assert!(err.to_string().starts_with("[CONFIG_INVALID] `index`"));
    }

    #[test]
    fn unknown_policy_is_invalid() {
        let svc = SettingsService::new(MapStore::default());
        svc.store
            .save_raw(SETTINGS_KEY, br#"{"reference_policy": "sometimes"}"#)
            .unwrap();
        assert!(matches!(svc.load(), Err(ConfigError::Invalid { .. })));
    }
}
