use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A fully buffered HTTP response held by the short-lived edge cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub expires_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Builds an entry that lives for the `max-age` of its own `Cache-Control`.
    ///
    /// Returns `None` when the response carries no usable `max-age`.
    pub fn from_parts(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Option<Self> {
        let max_age = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("cache-control"))
            .and_then(|(_, value)| max_age_of(value))?;
        let expires_at = Utc::now() + Duration::seconds(i64::try_from(max_age).ok()?);
        Some(Self {
            status,
            headers,
            body,
            expires_at,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Extracts the `max-age` directive from a `Cache-Control` value.
pub fn max_age_of(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Short-TTL response cache sitting in front of every cacheable route.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Returns the live entry for `key`; expired entries are reported as misses.
    async fn lookup(&self, key: &str) -> Result<Option<CachedResponse>>;

    async fn put(&self, key: &str, response: CachedResponse) -> Result<()>;

    /// Drops expired entries, returning how many were removed.
    async fn sweep(&self) -> Result<u64>;
}
