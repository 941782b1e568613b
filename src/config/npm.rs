use serde::Deserialize;

pub const DEFAULT_NPM_REGISTRY: &str = "https://registry.npmjs.org";

/// Registry settings used to resolve unpinned versions.
///
/// `npmrc` is a JSON document in the shape of [`crate::npmrc::Npmrc`]; when
/// present it replaces every other field here.
#[derive(Debug, Clone, Deserialize)]
pub struct NpmConfig {
    #[serde(default = "default_registry")]
    pub registry: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub npmrc: Option<String>,
}

impl Default for NpmConfig {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            token: None,
            user: None,
            password: None,
            npmrc: None,
        }
    }
}

fn default_registry() -> String {
    DEFAULT_NPM_REGISTRY.to_string()
}
