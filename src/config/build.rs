use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Serve `*.map` files for build artifacts.
    #[serde(default = "default_source_map")]
    pub source_map: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_map: default_source_map(),
        }
    }
}

fn default_source_map() -> bool {
    true
}
