use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EdgeCacheBackend {
    #[default]
    Memory,
    Redb,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeCacheConfig {
    #[serde(default)]
    pub backend: EdgeCacheBackend,
    /// Database file for the `redb` backend.
    #[serde(default = "EdgeCacheConfig::default_path")]
    pub path: PathBuf,
    /// Capacity of the `memory` backend.
    #[serde(default = "EdgeCacheConfig::default_max_entries")]
    pub max_entries: usize,
    /// Byte budget of the `memory` backend (bodies plus headers).
    #[serde(default = "EdgeCacheConfig::default_max_bytes")]
    pub max_bytes: usize,
    /// Cron schedule for dropping expired entries (e.g., "0 */5 * * * *" = every 5 minutes)
    /// Set to empty string to disable the sweep
    #[serde(default = "EdgeCacheConfig::default_sweep_schedule")]
    pub sweep_schedule: String,
}

impl EdgeCacheConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("./edge-cache.redb")
    }

    fn default_max_entries() -> usize {
        10_000
    }

    fn default_max_bytes() -> usize {
        256 * 1024 * 1024
    }

    fn default_sweep_schedule() -> String {
        crate::hotcache::DEFAULT_SWEEP_SCHEDULE.to_string()
    }

    pub fn normalize_paths(&mut self, base_dir: &Path) {
        if self.path.is_relative() {
            self.path = base_dir.join(&self.path);
        }
    }
}

impl Default for EdgeCacheConfig {
    fn default() -> Self {
        Self {
            backend: EdgeCacheBackend::default(),
            path: Self::default_path(),
            max_entries: Self::default_max_entries(),
            max_bytes: Self::default_max_bytes(),
            sweep_schedule: Self::default_sweep_schedule(),
        }
    }
}
