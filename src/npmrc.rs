//! Registry selection and credentials for version resolution.

use std::collections::BTreeMap;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{DEFAULT_NPM_REGISTRY, NpmConfig};

pub const JSR_NPM_REGISTRY: &str = "https://npm.jsr.io";
const JSR_SCOPE: &str = "@jsr";

/// One registry endpoint. `registry` is always a bare origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpmRegistry {
    #[serde(default)]
    pub registry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl NpmRegistry {
    fn anonymous(registry: &str) -> Self {
        Self {
            registry: registry.to_string(),
            ..Self::default()
        }
    }

    /// `Authorization` header value; a token wins over user/password.
    pub fn authorization(&self) -> Option<String> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Some(format!("Bearer {token}"));
        }
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                let credentials = format!("{user}:{password}");
                Some(format!("Basic {}", BASE64_STANDARD.encode(credentials)))
            }
            _ => None,
        }
    }

    /// `{registry}/{path}` with `path` taken verbatim.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.registry.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Process-wide registry configuration, built once at startup and shared
/// read-only by every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npmrc {
    #[serde(flatten)]
    pub default: NpmRegistry,
    #[serde(default)]
    pub registries: BTreeMap<String, NpmRegistry>,
}

impl Npmrc {
    pub fn from_config(config: &NpmConfig) -> Self {
        if let Some(raw) = config.npmrc.as_deref() {
            match Self::from_json(raw) {
                Ok(npmrc) => return npmrc,
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring invalid NPMRC override");
                }
            }
        }

        let mut default = NpmRegistry::anonymous(
            &url_origin(&config.registry).unwrap_or_else(|| DEFAULT_NPM_REGISTRY.to_string()),
        );
        if config.token.as_deref().is_some_and(|t| !t.is_empty()) {
            default.token = config.token.clone();
        } else if config.user.is_some() && config.password.is_some() {
            default.user = config.user.clone();
            default.password = config.password.clone();
        }

        let mut registries = BTreeMap::new();
        registries.insert(
            JSR_SCOPE.to_string(),
            NpmRegistry::anonymous(JSR_NPM_REGISTRY),
        );
        Self {
            default,
            registries,
        }
    }

    /// Parses the JSON override. Registry URLs are reduced to their origin,
    /// a missing default falls back to the public registry and `@jsr` is
    /// always routable.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let mut npmrc: Npmrc = serde_json::from_str(raw)?;
        npmrc.default.registry = url_origin(&npmrc.default.registry)
            .unwrap_or_else(|| DEFAULT_NPM_REGISTRY.to_string());
        npmrc
            .registries
            .entry(JSR_SCOPE.to_string())
            .or_insert_with(|| NpmRegistry::anonymous(JSR_NPM_REGISTRY));
        for registry in npmrc.registries.values_mut() {
            if let Some(origin) = url_origin(&registry.registry) {
                registry.registry = origin;
            }
        }
        Ok(npmrc)
    }

    /// Registry for a package name, honouring `@scope` overrides.
    pub fn registry_for(&self, package: &str) -> &NpmRegistry {
        package
            .strip_prefix('@')
            .and_then(|_| package.split('/').next())
            .and_then(|scope| self.registries.get(scope))
            .unwrap_or(&self.default)
    }
}

fn url_origin(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    match url.origin() {
        origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}
