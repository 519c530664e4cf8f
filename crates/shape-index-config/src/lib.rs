// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Settings service, config storage port, and filesystem adapter for
//! shape-index tools.

pub mod config;
pub mod fs;
pub mod settings;

pub use config::{ConfigError, ConfigStore, SettingsService};
pub use fs::FsConfigStore;
pub use settings::{IndexSettings, SETTINGS_KEY};
