//! Explicit invalidation of persisted build artifacts.
//!
//! The build server knows which objects belong to a package version; it
//! answers `POST /purge` with their keys and this proxy deletes them from the
//! object store before relaying the answer.

use anyhow::{Context, Result};
use rama::http::{Body, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::proxy::response::respond_json;
use crate::proxy::types::IncomingRequest;
use crate::storage::StorageTier;

pub const PURGE_PATH: &str = "/purge";

/// The build server's purge report. Unknown fields are passed through.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub deleted_files: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PurgeReport {
    /// Object keys to delete, prefixed with the reported zone.
    pub fn storage_keys(&self) -> Vec<String> {
        match &self.zone_id {
            Some(zone) => self
                .deleted_files
                .iter()
                .map(|file| format!("{zone}/{file}"))
                .collect(),
            None => self.deleted_files.clone(),
        }
    }
}

pub async fn purge(req: &IncomingRequest, storage: &StorageTier) -> Result<Response<Body>> {
    let upstream = storage
        .origin()
        .fetch(req.origin_request(PURGE_PATH))
        .await
        .context("forwarding purge to origin")?;
    if !upstream.is_success() {
        return Ok(upstream.into_response());
    }

    let body = upstream.into_bytes().await?;
    let report: PurgeReport =
        serde_json::from_slice(&body).context("parsing purge report from origin")?;

    let keys = report.storage_keys();
    if let Some(store) = storage.store()
        && !keys.is_empty()
    {
        let deleted = store
            .delete(&keys)
            .await
            .context("deleting purged objects")?;
        tracing::info!(
            requested = keys.len(),
            deleted,
            zone_id = report.zone_id.as_deref().unwrap_or(""),
            "purged objects from storage"
        );
    }

    let json = serde_json::to_string(&report).context("encoding purge report")?;
    respond_json(StatusCode::OK, &json)
}
