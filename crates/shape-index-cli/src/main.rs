// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! shape-index CLI
//!
//! Registers the archetype structure of JSON records in a directory-backed
//! structure store and runs containment queries against it.
//!
//! # Usage
//! ```text
//! shape-index --store-dir ./idx init
//! shape-index --store-dir ./idx index visit-1.json visit-2.json
//! shape-index --store-dir ./idx query --contains Visit --contains Person --contains '*'
//! shape-index --store-dir ./idx explain --contains Visit --contains Person
//! ```
//!
//! Settings (store directory, scope, reference policy, login) are read from
//! the `index` config key; flags override them.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shape_index::{ContainmentContainer, ReferencePolicy, StructureIndex};
use shape_index_config::{FsConfigStore, IndexSettings, SettingsService};
use shape_index_fs::DirStore;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shape-index", author, version, about, long_about = None)]
struct Args {
    /// Directory of the structure store
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,
    /// Collection holding the structures
    #[arg(long, global = true)]
    scope: Option<String>,
    /// Directory to read settings from (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// What happens to a structure's reference count on repeat encounters
    #[arg(long, global = true, value_enum)]
    reference_policy: Option<PolicyArg>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the scope collection in the store
    Init {
        /// Also persist the effective settings to the config dir
        #[arg(long)]
        save_config: bool,
    },
    /// Register the structure of each JSON record file and print its uid
    Index {
        /// Record files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the uids of structures matching a containment chain
    Query(Chain),
    /// Print the path expression a containment chain translates to
    Explain(Chain),
    /// List every stored structure
    List,
}

#[derive(clap::Args, Debug)]
struct Chain {
    /// Containment link, outermost first; `*` matches any archetype
    #[arg(long = "contains", value_name = "CLASS")]
    contains: Vec<String>,
}

impl Chain {
    fn containers(&self) -> Vec<ContainmentContainer> {
        self.contains
            .iter()
            .map(|link| match link.as_str() {
                "*" => ContainmentContainer::any(),
                class => ContainmentContainer::of_class(class),
            })
            .collect()
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Counted,
    Fixed,
}

impl From<PolicyArg> for ReferencePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Counted => Self::Counted,
            PolicyArg::Fixed => Self::Fixed,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = open_config(&args);
    let mut settings = load_settings(config.as_ref());
    apply_overrides(&mut settings, &args);
    debug!(store_dir = ?settings.store_dir, scope = %settings.scope, "effective settings");

    match &args.cmd {
        Command::Init { save_config } => {
            let target = target(&settings)?;
            let created = DirStore
                .create_scope(&target, &settings.scope())
                .context("creating scope")?;
            if created {
                println!("created scope {}", settings.scope);
            } else {
                println!("scope {} already exists", settings.scope);
            }
            if *save_config {
                let cfg = config.context("no config directory available")?;
                cfg.save(&settings).context("saving settings")?;
            }
        }
        Command::Index { files } => {
            let index = open_index(&settings)?;
            for file in files {
                let bytes =
                    fs::read(file).with_context(|| format!("reading {}", file.display()))?;
                let record: serde_json::Value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("parsing {}", file.display()))?;
                let uid = index
                    .get_or_create_structure_id(&record)
                    .with_context(|| format!("indexing {}", file.display()))?;
                println!("{}\t{uid}", file.display());
            }
        }
        Command::Query(chain) => {
            let index = open_index(&settings)?;
            for uid in index.get_matching_structure_ids(&chain.containers())? {
                println!("{uid}");
            }
        }
        Command::Explain(chain) => {
            let query = shape_index::build_query(&settings.scope(), &chain.containers())?;
            println!("{query}");
        }
        Command::List => {
            let index = open_index(&settings)?;
            for record in index.structures()? {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.structure_id.uid,
                    record.structure_id.hash,
                    record.reference_count,
                    record.structure.archetype_class
                );
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Best-effort: a missing or unreadable config dir falls back to defaults.
fn open_config(args: &Args) -> Option<SettingsService<FsConfigStore>> {
    let store = match &args.config_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    };
    match store {
        Ok(store) => Some(SettingsService::new(store)),
        Err(err) => {
            warn!(%err, "config dir unavailable; using defaults");
            None
        }
    }
}

// Unparsable settings are reported and replaced by defaults; flags still apply.
fn load_settings(config: Option<&SettingsService<FsConfigStore>>) -> IndexSettings {
    let Some(config) = config else {
        return IndexSettings::default();
    };
    match config.load() {
        Ok(settings) => settings,
        Err(err) => {
            warn!(%err, key = config.key(), "ignoring stored settings; using defaults");
            IndexSettings::default()
        }
    }
}

fn apply_overrides(settings: &mut IndexSettings, args: &Args) {
    if let Some(dir) = &args.store_dir {
        settings.store_dir = Some(dir.clone());
    }
    if let Some(scope) = &args.scope {
        settings.scope.clone_from(scope);
    }
    if let Some(policy) = args.reference_policy {
        settings.reference_policy = policy.into();
    }
}

fn target(settings: &IndexSettings) -> Result<shape_index::StoreTarget> {
    settings
        .target()
        .context("no store directory configured (pass --store-dir)")
}

fn open_index(settings: &IndexSettings) -> Result<StructureIndex<DirStore>> {
    Ok(
        StructureIndex::new(DirStore, target(settings)?, settings.scope())
            .with_reference_policy(settings.reference_policy),
    )
}
