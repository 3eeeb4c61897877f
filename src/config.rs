//! Profiler configuration
//!
//! The host persists these options however it likes; the core only needs a
//! serde-friendly struct. A TOML file loader is provided for the replay
//! binary.

use crate::provenance::ComponentRoots;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hook-name prefix reserved for this instrumentation's own hooks
pub const DEFAULT_RESERVED_PREFIX: &str = "pulso_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Master switch; when off, nothing is ever persisted
    pub tracking_enabled: bool,
    /// Percentage of requests whose sample is persisted, 0-100
    pub sampling_rate_percent: u8,
    /// How long the storage collaborator keeps samples
    pub retention_days: u32,
    /// Enable the hook profiler (highest overhead path)
    pub profile_hooks: bool,
    /// Rows shown in the slowest-query table
    pub slow_query_limit: usize,
    /// Components shown in the top-component table
    pub top_component_limit: usize,
    /// Filesystem roots used for component attribution
    pub roots: ComponentRoots,
    /// Hook-name prefixes excluded from hook profiling
    pub reserved_hook_prefixes: Vec<String>,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            tracking_enabled: true,
            sampling_rate_percent: 100,
            retention_days: 30,
            profile_hooks: false,
            slow_query_limit: 10,
            top_component_limit: 5,
            roots: ComponentRoots::default(),
            reserved_hook_prefixes: vec![DEFAULT_RESERVED_PREFIX.to_string()],
        }
    }
}

impl ProfilerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse profiler config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Retention window in seconds, for the storage purge
    pub fn retention_secs(&self) -> f64 {
        f64::from(self.retention_days) * 86_400.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let config = ProfilerConfig::default();
        assert!(config.tracking_enabled);
        assert_eq!(config.sampling_rate_percent, 100);
        assert_eq!(config.retention_days, 30);
        assert!(!config.profile_hooks);
        assert_eq!(config.slow_query_limit, 10);
        assert_eq!(config.top_component_limit, 5);
        assert_eq!(config.reserved_hook_prefixes, vec!["pulso_"]);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = ProfilerConfig::from_toml_str(
            "sampling_rate_percent = 25\nprofile_hooks = true\n",
        )
        .unwrap();
        assert_eq!(config.sampling_rate_percent, 25);
        assert!(config.profile_hooks);
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    fn test_roots_from_toml() {
        let config = ProfilerConfig::from_toml_str(
            "[roots]\nplugins = \"/srv/app/plugins\"\ntheme = \"/srv/app/theme\"\ncore = \"/srv/app/core\"\n",
        )
        .unwrap();
        assert_eq!(config.roots.plugins, PathBuf::from("/srv/app/plugins"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(ProfilerConfig::from_toml_str("not [[ valid").is_err());
    }

    #[test]
    fn test_round_trip() {
        let config = ProfilerConfig::default();
        let raw = toml::to_string(&config).unwrap();
        let back = ProfilerConfig::from_toml_str(&raw).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_retention_secs() {
        let config = ProfilerConfig {
            retention_days: 2,
            ..Default::default()
        };
        assert_eq!(config.retention_secs(), 172_800.0);
    }
}
