use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    Memory,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Tee origin bodies into storage while streaming them to the client.
    /// When off (or the length is unknown) bodies are buffered first.
    #[serde(default = "default_stream_writes")]
    pub stream_writes: bool,
}

impl StorageConfig {
    pub fn normalize_paths(&mut self, base_dir: &Path) {
        if self.path.is_relative() {
            self.path = base_dir.join(&self.path);
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            stream_writes: default_stream_writes(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./objects")
}

fn default_stream_writes() -> bool {
    true
}
