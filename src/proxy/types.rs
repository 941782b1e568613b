use std::time::Instant;

use anyhow::{Context, Result};
use bytes::Bytes;
use rama::http::{
    Body, HeaderMap, Method, Request,
    body::util::{BodyExt, LengthLimitError, Limited},
    header,
};

use crate::config::DEFAULT_MAX_BODY_BYTES;
use crate::error::RequestError;
use crate::headers::{X_FORWARDED_PROTO, header_str};
use crate::origin::OriginRequest;
use crate::query::QueryParams;

/// Cache status for request tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Pass,
    Hit,
    Miss,
    Store,
    Error,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Pass => write!(f, "pass"),
            CacheStatus::Hit => write!(f, "hit"),
            CacheStatus::Miss => write!(f, "miss"),
            CacheStatus::Store => write!(f, "store"),
            CacheStatus::Error => write!(f, "error"),
        }
    }
}

/// Request context for tracking request lifecycle
pub struct RequestContext {
    pub start: Instant,
    pub method: Method,
    pub path: String,
    pub cache: CacheStatus,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            method: Method::GET,
            path: String::new(),
            cache: CacheStatus::Pass,
        }
    }
}

impl RequestContext {
    pub fn from_request(req: &Request<Body>) -> Self {
        Self {
            start: Instant::now(),
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            cache: CacheStatus::Pass,
        }
    }
}

/// A fully read client request.
///
/// `query` starts out as the parsed request query and is replaced by the
/// router once the path parser has merged extra parameters into it; `search`
/// always keeps the form the client sent (plus `raw` on the raw host).
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    /// `host[:port]` the client addressed.
    pub host: String,
    /// `scheme://host[:port]`, the public origin of this proxy.
    pub origin: String,
    pub path: String,
    pub query: QueryParams,
    /// `?query` or empty.
    pub search: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IncomingRequest {
    /// [`Self::from_request_limited`] with the default body limit.
    pub async fn from_request(req: Request<Body>, raw_host: Option<&str>) -> Result<Self> {
        Self::from_request_limited(req, raw_host, DEFAULT_MAX_BODY_BYTES).await
    }

    /// Requests to `raw_host` gain the `raw` flag.
    ///
    /// Only POST bodies are read, up to `max_body` bytes; anything larger is
    /// [`RequestError::PayloadTooLarge`]. Other methods never forward a body.
    pub async fn from_request_limited(
        req: Request<Body>,
        raw_host: Option<&str>,
        max_body: usize,
    ) -> Result<Self> {
        let (parts, body) = req.into_parts();
        let body = if parts.method == Method::POST {
            read_body(&parts.headers, body, max_body).await?
        } else {
            Bytes::new()
        };

        let host = parts
            .uri
            .authority()
            .map(|authority| authority.as_str().to_string())
            .or_else(|| header_str(&parts.headers, header::HOST.as_str()).map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string());
        let scheme = header_str(&parts.headers, X_FORWARDED_PROTO.as_str())
            .or_else(|| parts.uri.scheme_str())
            .unwrap_or("http")
            .to_string();

        let raw_query = parts.uri.query().unwrap_or("");
        let mut query = QueryParams::parse(raw_query);
        let mut search = if raw_query.is_empty() {
            String::new()
        } else {
            format!("?{raw_query}")
        };
        let hostname = host.split(':').next().unwrap_or(&host);
        if raw_host.is_some_and(|raw| raw.eq_ignore_ascii_case(hostname)) {
            query.set("raw", "");
            search = query.to_search();
        }

        Ok(Self {
            method: parts.method,
            origin: format!("{scheme}://{host}"),
            host,
            path: parts.uri.path().to_string(),
            query,
            search,
            headers: parts.headers,
            body,
        })
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        header_str(&self.headers, name)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(header::USER_AGENT.as_str())
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// The full URL the client requested.
    pub fn url(&self) -> String {
        format!("{}{}{}", self.origin, self.path, self.search)
    }

    /// Forwards this request's method, headers and body to `uri` on the
    /// build server.
    pub fn origin_request(&self, uri: impl Into<String>) -> OriginRequest {
        OriginRequest {
            method: self.method.clone(),
            uri: uri.into(),
            headers: self.headers.clone(),
            real_origin: self.origin.clone(),
            body: self.body.clone(),
        }
    }
}

async fn read_body(headers: &HeaderMap, body: Body, max_body: usize) -> Result<Bytes> {
    let declared = header_str(headers, header::CONTENT_LENGTH.as_str())
        .and_then(|len| len.trim().parse::<u64>().ok());
    if declared.is_some_and(|len| len > max_body as u64) {
        return Err(RequestError::PayloadTooLarge.into());
    }
    match Limited::new(body, max_body).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(RequestError::PayloadTooLarge.into()),
        Err(err) => Err(anyhow::anyhow!(err)).context("reading request body"),
    }
}
