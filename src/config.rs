// Sync configuration.
// Loads API settings and freshness policy overrides from a JSON file in the platform config dir.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{FreshnessPolicy, Lifetime, PolicyTable, ResourceType};
use crate::error::Result;
use crate::github::client::GITHUB_API_BASE;

/// Replacement policy for one resource type.
///
/// Absent or `null` lifetimes mean forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverride {
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
    #[serde(default)]
    pub evict_after_secs: Option<u64>,
    #[serde(default)]
    pub refetch_on_activate: bool,
}

impl PolicyOverride {
    pub fn to_policy(&self) -> FreshnessPolicy {
        FreshnessPolicy::new(
            Lifetime::from_secs(self.stale_after_secs),
            Lifetime::from_secs(self.evict_after_secs),
            self.refetch_on_activate,
        )
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// REST API root, without a trailing slash.
    pub api_base: String,
    /// Environment variable holding the access token.
    pub token_env: String,
    /// Period of the idle-entry sweeper.
    pub sweep_interval_secs: u64,
    /// Page size for listing endpoints.
    pub per_page: u32,
    pub policies: HashMap<ResourceType, PolicyOverride>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base: GITHUB_API_BASE.to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            sweep_interval_secs: 60,
            per_page: 30,
            policies: HashMap::new(),
        }
    }
}

/// Path of the config file (~/.config/shoal/config.json on Linux).
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "shoal").map(|dirs| dirs.config_dir().join("config.json"))
}

impl SyncConfig {
    /// Load from the platform config dir, falling back to defaults.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from a file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: SyncConfig = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), overrides = config.policies.len(), "Loaded config");
        Ok(config)
    }

    /// Write to a file, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        // Write atomically via temp file
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Built-in policies with this config's overrides applied.
    pub fn policy_table(&self) -> PolicyTable {
        self.policies
            .iter()
            .fold(PolicyTable::new(), |table, (resource_type, policy)| {
                table.with(*resource_type, policy.to_policy())
            })
    }
}
