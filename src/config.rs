use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use url::Url;

pub mod build;
pub mod cors;
pub mod edge_cache;
pub mod legacy;
pub mod logging;
pub mod npm;
pub mod origin;
pub mod server;
pub mod storage;


pub use build::BuildConfig;
pub use cors::CorsConfig;
pub use edge_cache::{EdgeCacheBackend, EdgeCacheConfig};
pub use legacy::LegacyConfig;
pub use logging::LoggingConfig;
pub use npm::{DEFAULT_NPM_REGISTRY, NpmConfig};
pub use origin::OriginConfig;
pub use server::{DEFAULT_MAX_BODY_BYTES, ServerConfig};
pub use storage::{StorageBackend, StorageConfig};

pub const DEFAULT_CONFIG_FILE: &str = "sluice.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub npm: NpmConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub edge_cache: EdgeCacheConfig,
    #[serde(default)]
    pub legacy: LegacyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Reads the TOML file (defaults when absent) and applies process
    /// environment overrides.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let candidate = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = if candidate.exists() {
            let raw = fs::read_to_string(&candidate)
                .with_context(|| format!("failed to read config {}", candidate.display()))?;
            let mut config: Config = toml::from_str(&raw)
                .with_context(|| format!("invalid config {}", candidate.display()))?;
            config.normalize_paths(candidate.parent().unwrap_or(Path::new(".")));
            config
        } else {
            tracing::warn!(
                path = %candidate.display(),
                "configuration file not found, using defaults"
            );
            let mut config = Config::default();
            let cwd = std::env::current_dir().context("reading current directory")?;
            config.normalize_paths(&cwd);
            config
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn normalize_paths(&mut self, base_dir: &Path) {
        self.storage.normalize_paths(base_dir);
        self.edge_cache.normalize_paths(base_dir);
    }

    /// Overlays the deployment environment variables on top of the file.
    ///
    /// `lookup` abstracts `std::env::var` so tests do not mutate the process
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(raw) = var("ESM_SERVER_ORIGIN") {
            self.origin.url = Url::parse(raw.trim())
                .with_context(|| format!("invalid ESM_SERVER_ORIGIN '{raw}'"))?;
        }
        if let Some(token) = var("ESM_SERVER_TOKEN") {
            self.origin.token = Some(token);
        }
        if let Some(zone_id) = var("ZONE_ID") {
            self.origin.zone_id = Some(zone_id);
        }
        if let Some(registry) = var("NPM_REGISTRY") {
            self.npm.registry = registry;
        }
        if let Some(token) = var("NPM_TOKEN") {
            self.npm.token = Some(token);
        }
        if let Some(user) = var("NPM_USER") {
            self.npm.user = Some(user);
        }
        if let Some(password) = var("NPM_PASSWORD") {
            self.npm.password = Some(password);
        }
        if let Some(npmrc) = var("NPMRC") {
            self.npm.npmrc = Some(npmrc);
        }
        if let Some(list) = var("ALLOW_LIST") {
            self.cors.allow_list = CorsConfig::parse_list(&list);
        }
        if let Some(source_map) = var("SOURCE_MAP") {
            self.build.source_map = source_map.trim() != "off";
        }
        if let Some(raw) = var("LEGACY_WORKER_URL") {
            self.legacy.url = Some(
                Url::parse(raw.trim())
                    .with_context(|| format!("invalid LEGACY_WORKER_URL '{raw}'"))?,
            );
        }
        if let Some(host) = var("RAW_HOST") {
            self.server.raw_host = Some(host);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure_http_scheme("origin", &self.origin.url)?;
        if let Some(url) = &self.legacy.url {
            ensure_http_scheme("legacy worker", url)?;
        }
        Url::parse(&self.npm.registry)
            .with_context(|| format!("invalid npm registry '{}'", self.npm.registry))?;
        if self.edge_cache.backend == EdgeCacheBackend::Memory && self.edge_cache.max_entries == 0
        {
            bail!("edge_cache.max_entries must be greater than zero");
        }
        if self.edge_cache.backend == EdgeCacheBackend::Memory && self.edge_cache.max_bytes == 0 {
            bail!("edge_cache.max_bytes must be greater than zero");
        }
        Ok(())
    }
}

fn ensure_http_scheme(label: &str, url: &Url) -> Result<()> {
    if url.scheme() != "https" && url.scheme() != "http" {
        bail!("unsupported {label} scheme {url}");
    }
    Ok(())
}
