use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct OriginConfig {
    #[serde(default = "default_origin_url", with = "serde_url")]
    pub url: Url,
    /// Bearer token sent to the build server.
    #[serde(default)]
    pub token: Option<String>,
    /// Tenant namespace; prefixes storage keys and is forwarded as `X-Zone-Id`.
    #[serde(default)]
    pub zone_id: Option<String>,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: default_origin_url(),
            token: None,
            zone_id: None,
        }
    }
}

pub(crate) fn default_origin_url() -> Url {
    Url::parse("https://esm.sh").expect("static origin url")
}

pub(crate) mod serde_url {
    use serde::{Deserialize, Deserializer};
    use url::Url;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Url, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Url::parse(&s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod serde_url_opt {
    use serde::{Deserialize, Deserializer};
    use url::Url;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Url>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| Url::parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
