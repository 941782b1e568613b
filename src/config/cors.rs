use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Host names allowed to embed modules; empty means open CORS.
    #[serde(default)]
    pub allow_list: Vec<String>,
}

impl CorsConfig {
    /// Parses the comma separated `ALLOW_LIST` form.
    pub fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }
}
