use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyConfig {
    /// Base URL of the worker that still serves the deprecated URL shapes.
    #[serde(default, with = "super::origin::serde_url_opt")]
    pub url: Option<Url>,
}
