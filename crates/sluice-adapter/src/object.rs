use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Metadata persisted next to every stored object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Final resolved module path reported by the origin (`X-Esm-Path`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esm_path: Option<String>,
    /// Types URL reported by the origin (`X-TypeScript-Types`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dts: Option<String>,
}

impl ObjectMetadata {
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub metadata: ObjectMetadata,
}

/// Durable object storage for build artifacts, raw assets and error logs.
///
/// Objects are written once and read many times. Writers racing on the same
/// key always carry the same bytes, so implementations need no locking beyond
/// an atomic replace.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>>;

    async fn put(&self, key: &str, body: Bytes, metadata: ObjectMetadata) -> Result<()>;

    /// Removes every listed key, returning how many objects actually existed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;
}
