//! Deprecated URL shapes are handed to a separate worker wholesale.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rama::{
    Service,
    http::{Body, Request, Response, header},
    http::client::EasyHttpWebClient,
};
use regex::Regex;
use url::Url;

use crate::proxy::types::IncomingRequest;
use crate::query::QueryParams;

static VERSION_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/v\d+/").expect("static legacy version pattern"));
static BUILD_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/~[a-f0-9]{40}$").expect("static legacy build pattern"));

/// `/build`, `/stable/…`, `/v<n>/…`, `/~<sha1>` or a `pin` query parameter.
pub fn is_legacy_request(path: &str, query: &QueryParams) -> bool {
    path == "/build"
        || query.has("pin")
        || path.starts_with("/stable/")
        || VERSION_PREFIX.is_match(path)
        || BUILD_HASH.is_match(path)
}

#[async_trait]
pub trait LegacyWorker: Send + Sync {
    async fn fetch(&self, req: &IncomingRequest) -> Result<Response<Body>>;
}

/// Replays the client request against the legacy worker's base URL and
/// returns its response untouched.
#[derive(Debug, Clone)]
pub struct HttpLegacyWorker {
    base: Url,
}

impl HttpLegacyWorker {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    fn build_request(&self, req: &IncomingRequest) -> Result<Request<Body>> {
        let url = self
            .base
            .join(&format!("{}{}", req.path, req.search))
            .with_context(|| format!("joining legacy worker url with {}", req.path))?;
        let mut builder = Request::builder()
            .method(req.method.clone())
            .uri(url.as_str());
        {
            let headers = builder.headers_mut().context("getting headers")?;
            for (name, value) in req.headers.iter() {
                if name == header::HOST || name == header::CONTENT_LENGTH {
                    continue;
                }
                headers.append(name, value.clone());
            }
        }
        builder
            .body(Body::from(req.body.clone()))
            .context("building legacy request")
    }
}

#[async_trait]
impl LegacyWorker for HttpLegacyWorker {
    async fn fetch(&self, req: &IncomingRequest) -> Result<Response<Body>> {
        let request = self.build_request(req)?;
        let client = EasyHttpWebClient::default();
        client
            .serve(request)
            .await
            .map_err(|e| anyhow!("legacy worker request failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(path: &str, query: &str) -> bool {
        is_legacy_request(path, &QueryParams::parse(query))
    }

    #[test]
    fn detects_deprecated_shapes() {
        assert!(legacy("/build", ""));
        assert!(legacy("/stable/react@18.2.0", ""));
        assert!(legacy("/v135/react@18.2.0/es2022/react.mjs", ""));
        assert!(legacy("/~0123456789abcdef0123456789abcdef01234567", ""));
        assert!(legacy("/react@18.2.0", "pin=v135"));
    }

    #[test]
    fn leaves_current_shapes_alone() {
        assert!(!legacy("/react@18.2.0", ""));
        assert!(!legacy("/vue@3.4.0", ""));
        assert!(!legacy("/v1", ""));
        assert!(!legacy("/~abc", ""));
        assert!(!legacy("/builder", ""));
    }

    #[tokio::test]
    async fn request_targets_base_with_path_and_query() {
        let request = Request::builder()
            .uri("/v135/react?dev")
            .header("host", "cdn.example")
            .header("user-agent", "Deno/1.40.0")
            .body(Body::empty())
            .unwrap();
        let req = IncomingRequest::from_request(request, None).await.unwrap();
        let worker = HttpLegacyWorker::new(Url::parse("https://legacy.example").unwrap());
        let built = worker.build_request(&req).unwrap();
        assert_eq!(built.uri().to_string(), "https://legacy.example/v135/react?dev");
        assert!(built.headers().get(header::HOST).is_none());
        assert_eq!(built.headers()[header::USER_AGENT], "Deno/1.40.0");
    }
}
