//! Durable tier between the edge cache and the origin.
//!
//! Immutable builds and raw assets are kept in an [`ObjectStore`] so they
//! survive edge-cache expiry and restarts. Writes happen in the background
//! and never hold up the client response.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use rama::http::{Body, HeaderMap, HeaderValue, Response, StatusCode, header};
use serde::Serialize;
use sluice_adapter::{ObjectMetadata, ObjectStore, StoredObject};

use crate::content_type::content_type_for;
use crate::headers::{
    CC_IMMUTABLE, X_CONTENT_SOURCE, X_ESM_PATH, X_REAL_ORIGIN, X_TYPESCRIPT_TYPES,
    expose_custom_headers,
};
use crate::origin::{Origin, OriginResponse};
use crate::proxy::types::IncomingRequest;
use crate::specifier::is_dts_file;
use crate::tasks::BackgroundTasks;
use crate::tee::{buffer, tee};

const SOURCE_STORAGE: &str = "storage";
const SOURCE_ORIGIN: &str = "origin";

#[derive(Serialize)]
struct ErrorLog<'a> {
    url: &'a str,
    headers: std::collections::BTreeMap<String, String>,
    message: String,
    stack: String,
}

#[derive(Clone)]
pub struct StorageTier {
    store: Option<Arc<dyn ObjectStore>>,
    origin: Arc<dyn Origin>,
    zone_id: Option<String>,
    stream_writes: bool,
    tasks: BackgroundTasks,
}

/// Storage key of a build request and whether it is a "static" one (raw
/// file, declaration or source map) whose query does not matter.
pub fn build_key(path: &str, query: &str, raw: bool) -> (String, bool) {
    let dts = is_dts_file(path);
    let is_static = raw || dts || path.ends_with(".mjs.map") || path.ends_with(".js.map");
    if !is_static {
        return (format!("{path}{query}").trim_start_matches('/').to_string(), false);
    }
    let mut key = path.strip_prefix('/').unwrap_or(path);
    if raw || dts {
        key = key.strip_prefix('*').unwrap_or(key);
    }
    (key.to_string(), true)
}

impl StorageTier {
    pub fn new(
        store: Option<Arc<dyn ObjectStore>>,
        origin: Arc<dyn Origin>,
        zone_id: Option<String>,
        stream_writes: bool,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            store,
            origin,
            zone_id,
            stream_writes,
            tasks,
        }
    }

    pub fn store(&self) -> Option<&Arc<dyn ObjectStore>> {
        self.store.as_ref()
    }

    pub fn origin(&self) -> &Arc<dyn Origin> {
        &self.origin
    }

    /// Prefixes `key` with the zone, if any.
    pub fn zoned(&self, key: &str) -> String {
        match &self.zone_id {
            Some(zone) => format!("{zone}/{key}"),
            None => key.to_string(),
        }
    }

    /// Compiled module, stylesheet, declaration or source map.
    ///
    /// `query` is either empty or starts with `?`. Requests relayed by a
    /// fronting worker (`X-Real-Origin`) bypass storage entirely.
    pub async fn fetch_build(
        &self,
        req: &IncomingRequest,
        path: &str,
        query: &str,
    ) -> Result<Response<Body>> {
        let (key, is_static) = build_key(path, query, req.query.has("raw"));
        let key = self.zoned(&key);
        let store = self
            .store
            .as_ref()
            .filter(|_| !req.headers.contains_key(X_REAL_ORIGIN));

        if let Some(store) = store
            && let Some(object) = self.read(store, &key).await
        {
            return Ok(stored_response(object, path, !is_static));
        }

        let upstream = self
            .origin
            .fetch(req.origin_request(format!("{path}{query}")))
            .await?;
        if !upstream.is_success() {
            return Ok(upstream.into_response());
        }

        let content_type = upstream
            .header(header::CONTENT_TYPE)
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(path).to_string());
        let immutable = upstream.header(header::CACHE_CONTROL) == Some(CC_IMMUTABLE);
        let metadata = ObjectMetadata {
            content_type: Some(content_type.clone()),
            esm_path: upstream.header(X_ESM_PATH).map(str::to_string),
            dts: upstream.header(X_TYPESCRIPT_TYPES).map(str::to_string),
        };

        let OriginResponse {
            status,
            mut headers,
            content_length,
            body,
        } = upstream;
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(&content_type)?);
        headers.insert(X_CONTENT_SOURCE, HeaderValue::from_static(SOURCE_ORIGIN));

        let body = match store {
            Some(store) if immutable => {
                self.persist(store.clone(), key, body, content_length, metadata)
                    .await?
            }
            _ => body,
        };
        Ok(assemble(status, headers, body))
    }

    /// Raw package file (wasm, json, images, fonts, ...), always immutable.
    pub async fn fetch_asset(&self, req: &IncomingRequest, path: &str) -> Result<Response<Body>> {
        let key = self.zoned(path.trim_start_matches('/'));
        if let Some(store) = &self.store
            && let Some(object) = self.read(store, &key).await
        {
            return Ok(stored_response(object, path, false));
        }

        let upstream = self.origin.fetch(req.origin_request(path.to_string())).await?;
        if !upstream.is_success() {
            return Ok(upstream.into_response());
        }

        let content_type = upstream
            .header(header::CONTENT_TYPE)
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(path).to_string());
        let OriginResponse {
            status,
            mut headers,
            content_length,
            body,
        } = upstream;
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(&content_type)?);
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CC_IMMUTABLE));
        headers.insert(X_CONTENT_SOURCE, HeaderValue::from_static(SOURCE_ORIGIN));

        let body = match &self.store {
            Some(store) => {
                let metadata = ObjectMetadata::with_content_type(content_type);
                self.persist(store.clone(), key, body, content_length, metadata)
                    .await?
            }
            None => body,
        };
        Ok(assemble(status, headers, body))
    }

    /// Writes an error report to `errors/<date>/<millis>.log` in the
    /// background. A no-op without a store.
    pub fn record_error(&self, url: &str, request_headers: &HeaderMap, err: &anyhow::Error) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let now = Utc::now();
        let key = format!(
            "errors/{}/{}.log",
            now.format("%Y-%m-%d"),
            now.timestamp_millis()
        );
        let log = ErrorLog {
            url,
            headers: request_headers
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect(),
            message: err.to_string(),
            stack: format!("{err:?}"),
        };
        let body = match serde_json::to_vec(&log) {
            Ok(body) => body,
            Err(encode_err) => {
                tracing::warn!(error = %encode_err, "failed to encode error log");
                return;
            }
        };
        self.tasks.spawn("error-log", async move {
            store
                .put(
                    &key,
                    body.into(),
                    ObjectMetadata::with_content_type("application/json; charset=utf-8"),
                )
                .await
        });
    }

    async fn read(&self, store: &Arc<dyn ObjectStore>, key: &str) -> Option<StoredObject> {
        match store.get(key).await {
            Ok(object) => object,
            Err(err) => {
                tracing::warn!(%key, error = %err, "storage read failed, falling back to origin");
                None
            }
        }
    }

    /// Hands `body` back for the client while a copy is written under `key`.
    /// Bodies of known length are streamed through a tee; the rest are
    /// buffered first.
    async fn persist(
        &self,
        store: Arc<dyn ObjectStore>,
        key: String,
        body: Body,
        content_length: Option<u64>,
        metadata: ObjectMetadata,
    ) -> Result<Body> {
        if self.stream_writes && content_length.is_some() {
            return Ok(tee(body, &self.tasks, "storage-put", move |bytes| async move {
                store.put(&key, bytes, metadata).await
            }));
        }
        let bytes = buffer(body).await?;
        let copy = bytes.clone();
        self.tasks.spawn("storage-put", async move {
            store.put(&key, copy, metadata).await
        });
        Ok(Body::from(bytes))
    }
}

fn stored_response(object: StoredObject, path: &str, with_module_headers: bool) -> Response<Body> {
    let mut headers = HeaderMap::new();
    let content_type = object
        .metadata
        .content_type
        .as_deref()
        .unwrap_or_else(|| content_type_for(path));
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CC_IMMUTABLE));
    if with_module_headers {
        if let Some(value) = object
            .metadata
            .esm_path
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(X_ESM_PATH, value);
        }
        if let Some(value) = object
            .metadata
            .dts
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(X_TYPESCRIPT_TYPES, value);
        }
        expose_custom_headers(&mut headers);
    }
    headers.insert(X_CONTENT_SOURCE, HeaderValue::from_static(SOURCE_STORAGE));
    assemble(StatusCode::OK, headers, Body::from(object.body))
}

fn assemble(status: StatusCode, headers: HeaderMap, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
