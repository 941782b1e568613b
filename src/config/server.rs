use serde::Deserialize;

/// Upper bound on a buffered `POST` body (`/transform`, `/bundle`, `/purge`).
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Listener settings for the proxy itself.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind, `0.0.0.0` by default.
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    /// Tokio worker threads serving requests; defaults to the CPU count.
    #[serde(default = "num_cpus::get")]
    pub workers: usize,
    /// Host name (e.g. `raw.esm.sh`) whose requests are routed as if they
    /// carried `?raw`, serving package files untransformed.
    #[serde(default)]
    pub raw_host: Option<String>,
    /// Larger `POST` bodies are refused with 413 before reaching the origin.
    #[serde(default = "ServerConfig::default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".into()
    }

    fn default_port() -> u16 {
        8346
    }

    fn default_max_body_bytes() -> usize {
        DEFAULT_MAX_BODY_BYTES
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            workers: num_cpus::get(),
            raw_host: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
