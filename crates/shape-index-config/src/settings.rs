// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted settings for shape-index tools.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use shape_index::{ReferencePolicy, StoreScope, StoreTarget};

/// Config key the settings live under.
pub const SETTINGS_KEY: &str = "index";

/// Where the structure store lives and how the index writes to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory of the structure store.
    pub store_dir: Option<PathBuf>,
    /// Collection holding the structures.
    pub scope: String,
    /// Reference counting on repeat encounters.
    pub reference_policy: ReferencePolicy,
    /// Store login name.
    pub user: Option<String>,
    /// Store login secret.
    pub password: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            store_dir: None,
            scope: "path_index".into(),
            reference_policy: ReferencePolicy::default(),
            user: None,
            password: None,
        }
    }
}

impl IndexSettings {
    /// Store target for `store_dir`, with credentials when a user is set.
    pub fn target(&self) -> Option<StoreTarget> {
        let dir = self.store_dir.as_ref()?;
        let target = StoreTarget::new(dir.display().to_string());
        Some(match &self.user {
            Some(user) => target.with_credentials(user, self.password.clone().unwrap_or_default()),
            None => target,
        })
    }

    /// Scope as a store handle.
    pub fn scope(&self) -> StoreScope {
        StoreScope::new(self.scope.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{FsConfigStore, SettingsService};

    #[test]
    fn partial_json_fills_defaults() {
        let settings: IndexSettings =
            serde_json::from_str(r#"{"store_dir": "/tmp/idx", "reference_policy": "fixed"}"#)
                .unwrap();
        assert_eq!(settings.scope, "path_index");
        assert_eq!(settings.reference_policy, ReferencePolicy::Fixed);
        assert_eq!(settings.target().unwrap().endpoint, "/tmp/idx");
    }

    #[test]
    fn no_store_dir_means_no_target() {
        assert!(IndexSettings::default().target().is_none());
    }

    #[test]
    fn credentials_follow_user() {
        let settings = IndexSettings {
            store_dir: Some("/srv/idx".into()),
            user: Some("admin".into()),
            ..IndexSettings::default()
        };
        let creds = settings.target().unwrap().credentials.unwrap();
        assert_eq!(creds.user, "admin");
        assert_eq!(creds.password, "");
    }

    #[test]
    fn settings_persist_through_service() {
        let dir = tempfile::tempdir().unwrap();
        let svc = SettingsService::new(FsConfigStore::at(dir.path()).unwrap());
        assert_eq!(svc.load().unwrap(), IndexSettings::default());
        let settings = IndexSettings {
            scope: "wards".into(),
            ..IndexSettings::default()
        };
        svc.save(&settings).unwrap();
        assert_eq!(svc.load().unwrap(), settings);
        assert!(dir.path().join(format!("{SETTINGS_KEY}.json")).is_file());
    }
}
