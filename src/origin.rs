//! Upstream clients: the build server ("origin") and npm registries.
//!
//! Both sit behind traits so the router can be exercised with in-process
//! fakes; the HTTP implementations use rama's web client.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use rama::{
    Service,
    http::{
        Body, HeaderMap, HeaderValue, Method, Request, Response, StatusCode,
        body::util::BodyExt,
        client::EasyHttpWebClient,
        header,
    },
};
use url::Url;

use crate::config::OriginConfig;
use crate::headers::{
    X_ESM_PATH, X_FORWARDED_FOR, X_NPMRC, X_REAL_IP, X_REAL_ORIGIN, X_TYPESCRIPT_TYPES,
    X_ZONE_ID, copy_headers, expose_custom_headers,
};
use crate::npmrc::NpmRegistry;

pub const UA: &str = concat!("sluice/", env!("CARGO_PKG_VERSION"));

/// A request for the build server.
#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub method: Method,
    /// Path plus optional `?query`.
    pub uri: String,
    /// Headers of the incoming client request.
    pub headers: HeaderMap,
    /// Public origin of this proxy, sent as `X-Real-Origin` unless the client
    /// already carried one.
    pub real_origin: String,
    pub body: Bytes,
}

/// Status, relayed headers and body of an upstream reply.
#[derive(Debug)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Declared body length, when upstream announced one.
    pub content_length: Option<u64>,
    pub body: Body,
}

impl OriginResponse {
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            status,
            headers,
            content_length: Some(body.len() as u64),
            body: Body::from(body),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        crate::headers::header_str(&self.headers, name)
    }

    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    pub async fn into_bytes(self) -> Result<Bytes> {
        Ok(self
            .body
            .collect()
            .await
            .context("reading origin response body")?
            .to_bytes())
    }
}

#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse>;
}

/// Forwards requests to the configured build server.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    base: Url,
    token: Option<String>,
    zone_id: Option<String>,
    npmrc: Option<String>,
}

impl HttpOrigin {
    /// `npmrc` is the raw JSON override, relayed so the build server resolves
    /// dependencies against the same registries.
    pub fn new(config: &OriginConfig, npmrc: Option<&str>) -> Self {
        Self {
            base: config.url.clone(),
            token: config.token.clone(),
            zone_id: config.zone_id.clone(),
            npmrc: npmrc.map(str::to_string),
        }
    }

    fn build_request(&self, request: OriginRequest) -> Result<Request<Body>> {
        let url = self
            .base
            .join(&request.uri)
            .with_context(|| format!("joining origin url with {}", request.uri))?;
        // the body of a HEAD reply is dropped by the edge cache instead
        let method = if request.method == Method::HEAD {
            Method::GET
        } else {
            request.method
        };

        let mut builder = Request::builder().method(method).uri(url.as_str());
        {
            let headers = builder.headers_mut().context("getting headers")?;
            copy_headers(
                headers,
                &request.headers,
                &[
                    header::CONTENT_TYPE,
                    header::REFERER,
                    header::USER_AGENT,
                    header::IF_NONE_MATCH,
                    X_FORWARDED_FOR,
                    X_REAL_IP,
                    X_REAL_ORIGIN,
                ],
            );
            if !headers.contains_key(X_REAL_ORIGIN) {
                headers.insert(X_REAL_ORIGIN, HeaderValue::from_str(&request.real_origin)?);
            }
            if !headers.contains_key(header::USER_AGENT) {
                headers.insert(header::USER_AGENT, HeaderValue::from_static(UA));
            }
            if let Some(token) = &self.token {
                headers.insert(
                    header::AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {token}"))?,
                );
            }
            if let Some(zone_id) = &self.zone_id {
                headers.insert(X_ZONE_ID, HeaderValue::from_str(zone_id)?);
            }
            if let Some(npmrc) = &self.npmrc {
                headers.insert(X_NPMRC, HeaderValue::from_str(npmrc)?);
            }
            if !request.body.is_empty() {
                headers.insert(
                    header::CONTENT_LENGTH,
                    HeaderValue::from_str(&request.body.len().to_string())?,
                );
            }
        }

        builder
            .body(Body::from(request.body))
            .context("building origin request")
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse> {
        let request = self.build_request(request)?;
        let client = EasyHttpWebClient::default();
        let response = client
            .serve(request)
            .await
            .map_err(|e| anyhow!("origin request failed: {e}"))?;

        let status = response.status();
        let content_length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let headers = relay_headers(status, response.headers());
        Ok(OriginResponse {
            status,
            headers,
            content_length,
            body: response.into_body(),
        })
    }
}

/// The subset of upstream headers handed back to clients.
pub fn relay_headers(status: StatusCode, upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if !status.is_success() {
        copy_headers(
            &mut headers,
            upstream,
            &[header::CACHE_CONTROL, header::CONTENT_TYPE],
        );
        if matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND) {
            copy_headers(&mut headers, upstream, &[header::LOCATION]);
        }
        return headers;
    }
    copy_headers(
        &mut headers,
        upstream,
        &[
            header::CACHE_CONTROL,
            header::CONTENT_TYPE,
            header::ETAG,
            X_ESM_PATH,
            X_TYPESCRIPT_TYPES,
        ],
    );
    expose_custom_headers(&mut headers);
    headers
}

/// Body and status of a registry document.
#[derive(Debug, Clone)]
pub struct RegistryReply {
    pub status: StatusCode,
    pub body: Bytes,
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// GETs `path` (a package name, or `name/version`) from `registry`.
    async fn get(&self, registry: &NpmRegistry, path: &str) -> Result<RegistryReply>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpRegistry;

#[async_trait]
impl Registry for HttpRegistry {
    async fn get(&self, registry: &NpmRegistry, path: &str) -> Result<RegistryReply> {
        let url = registry.url_for(path);
        let mut builder = Request::builder().method(Method::GET).uri(url.as_str());
        {
            let headers = builder.headers_mut().context("getting headers")?;
            headers.insert(header::USER_AGENT, HeaderValue::from_static(UA));
            headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
            if let Some(authorization) = registry.authorization() {
                headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&authorization)?);
            }
        }
        let request = builder
            .body(Body::empty())
            .context("building registry request")?;

        let client = EasyHttpWebClient::default();
        let response = client
            .serve(request)
            .await
            .map_err(|e| anyhow!("registry request to {url} failed: {e}"))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .context("reading registry response body")?
            .to_bytes();
        Ok(RegistryReply { status, body })
    }
}
