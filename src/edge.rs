//! The short-lived response cache wrapped around every cacheable route.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use rama::http::{
    Body, HeaderMap, HeaderName, HeaderValue, Response, StatusCode, header,
};
use sluice_adapter::{CachedResponse, ResponseCache};

use crate::headers::CC_PUBLIC_PREFIX;
use crate::proxy::types::{CacheStatus, IncomingRequest};
use crate::specifier::is_dts_file;
use crate::target::{is_known_target, target_from_user_agent};
use crate::tasks::BackgroundTasks;
use crate::tee::tee;

#[derive(Clone)]
pub struct EdgeCache {
    cache: Option<Arc<dyn ResponseCache>>,
    zone_id: Option<String>,
    tasks: BackgroundTasks,
}

impl EdgeCache {
    /// `cache = None` turns every lookup into a miss and skips stores.
    pub fn new(
        cache: Option<Arc<dyn ResponseCache>>,
        zone_id: Option<String>,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            cache,
            zone_id,
            tasks,
        }
    }

    /// Target derived from the user agent when the route varies by it and
    /// the request does not pin one itself.
    pub fn user_agent_target(req: &IncomingRequest, vary_ua: bool) -> Option<&'static str> {
        let pinned = req.query.get("target").is_some_and(is_known_target);
        if !vary_ua || pinned || is_dts_file(&req.path) || req.query.has("raw") {
            return None;
        }
        Some(target_from_user_agent(req.user_agent()))
    }

    /// `host + path + ?query` where the query is the allow-listed request
    /// query plus the negotiated target, the fronting worker's origin and
    /// the zone.
    pub fn cache_key(&self, req: &IncomingRequest, ua_target: Option<&str>) -> String {
        let mut query = req.query.normalized();
        if let Some(target) = ua_target {
            query.set("target", target);
        }
        if let Some(real_origin) = req.header(crate::headers::X_REAL_ORIGIN) {
            query.set("x-origin", real_origin);
        }
        if let Some(zone_id) = &self.zone_id {
            query.set("x-zone-id", zone_id);
        }
        format!("{}{}{}", req.host, req.path, query.to_search())
    }

    /// Serves from the cache or runs `fetcher`, storing public results.
    ///
    /// `fetcher` receives the user-agent target when the route varies by it;
    /// such responses gain `Vary: User-Agent`. HEAD requests get the status
    /// and headers only (a bare 204 on a hit).
    pub async fn with_cache<F, Fut>(
        &self,
        req: &IncomingRequest,
        vary_ua: bool,
        fetcher: F,
    ) -> Result<(Response<Body>, CacheStatus)>
    where
        F: FnOnce(Option<&'static str>) -> Fut,
        Fut: Future<Output = Result<Response<Body>>>,
    {
        let ua_target = Self::user_agent_target(req, vary_ua);
        let key = self.cache_key(req, ua_target);

        if let Some(cache) = &self.cache {
            match cache.lookup(&key).await {
                Ok(Some(hit)) => {
                    tracing::debug!(%key, "edge cache hit");
                    return Ok((from_cached(hit, req.is_head()), CacheStatus::Hit));
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(%key, error = %err, "edge cache lookup failed"),
            }
        }

        let mut response = fetcher(ua_target).await?;
        if ua_target.is_some() {
            response
                .headers_mut()
                .append(header::VARY, HeaderValue::from_static("User-Agent"));
        }

        let mut status = CacheStatus::Miss;
        if let Some(cache) = &self.cache
            && is_cacheable(&response)
        {
            let cache = cache.clone();
            let code = response.status().as_u16();
            let headers = header_pairs(response.headers());
            let (parts, body) = response.into_parts();
            let body = tee(body, &self.tasks, "edge-cache-put", move |bytes| async move {
                if let Some(entry) = CachedResponse::from_parts(code, headers, bytes) {
                    cache.put(&key, entry).await?;
                }
                Ok(())
            });
            response = Response::from_parts(parts, body);
            status = CacheStatus::Store;
        }

        if req.is_head() {
            let (parts, _body) = response.into_parts();
            return Ok((Response::from_parts(parts, Body::empty()), status));
        }
        Ok((response, status))
    }
}

fn is_cacheable(response: &Response<Body>) -> bool {
    response.status().is_success()
        && response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|cc| cc.starts_with(CC_PUBLIC_PREFIX))
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn from_cached(entry: CachedResponse, head: bool) -> Response<Body> {
    let (status, body) = if head {
        (StatusCode::NO_CONTENT, Body::empty())
    } else {
        (
            StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK),
            Body::from(entry.body),
        )
    };
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in entry.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            headers.append(name, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tee::buffer;
    use rama::http::{Method, Request};
    use sluice_adapter::MemoryResponseCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    async fn incoming(method: Method, uri: &str, ua: Option<&str>) -> IncomingRequest {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "cdn.example");
        if let Some(ua) = ua {
            builder = builder.header(header::USER_AGENT, ua);
        }
        IncomingRequest::from_request(builder.body(Body::empty()).unwrap(), None)
            .await
            .unwrap()
    }

    fn edge(cache: Arc<MemoryResponseCache>, tasks: &BackgroundTasks) -> EdgeCache {
        EdgeCache::new(Some(cache), Some("z1".into()), tasks.clone())
    }

    fn public(body: &'static str, cc: &'static str) -> Result<Response<Body>> {
        let mut response = Response::new(Body::from(body));
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(cc));
        Ok(response)
    }

    #[tokio::test]
    async fn key_includes_normalized_query_target_and_zone() {
        let tasks = BackgroundTasks::new();
        let edge = edge(Arc::new(MemoryResponseCache::new(8, 1 << 20)), &tasks);
        let req = incoming(Method::GET, "/react@18.2.0?utm=1&dev", Some(CHROME)).await;
        let target = EdgeCache::user_agent_target(&req, true);
        assert_eq!(target, Some("es2022"));
        assert_eq!(
            edge.cache_key(&req, target),
            "cdn.example/react@18.2.0?dev=&target=es2022&x-zone-id=z1"
        );
    }

    #[tokio::test]
    async fn pinned_target_dts_and_raw_do_not_vary() {
        for uri in [
            "/react@18.2.0?target=es2018",
            "/react@18.2.0/index.d.ts",
            "/react@18.2.0/package.json?raw",
        ] {
            let req = incoming(Method::GET, uri, Some(CHROME)).await;
            assert_eq!(EdgeCache::user_agent_target(&req, true), None, "{uri}");
        }
        let req = incoming(Method::GET, "/react@18.2.0?target=bogus", Some(CHROME)).await;
        assert_eq!(EdgeCache::user_agent_target(&req, true), Some("es2022"));
    }

    #[tokio::test]
    async fn stores_public_responses_and_serves_hits() {
        let tasks = BackgroundTasks::new();
        let cache = Arc::new(MemoryResponseCache::new(8, 1 << 20));
        let edge = edge(cache.clone(), &tasks);
        let calls = AtomicUsize::new(0);
        let req = incoming(Method::GET, "/react@18.2.0", Some(CHROME)).await;

        let (response, status) = edge
            .with_cache(&req, true, |target| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(target, Some("es2022"));
                async { public("export {}", "public, max-age=600") }
            })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Store);
        assert_eq!(response.headers()[header::VARY], "User-Agent");
        assert_eq!(buffer(response.into_body()).await.unwrap(), "export {}");
        assert!(tasks.drain(Duration::from_secs(5)).await);
        assert_eq!(cache.len(), 1);

        let (response, status) = edge
            .with_cache(&req, true, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { public("other", "public, max-age=600") }
            })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.headers()[header::VARY], "User-Agent");
        assert_eq!(buffer(response.into_body()).await.unwrap(), "export {}");
    }

    #[tokio::test]
    async fn private_and_failed_responses_are_not_stored() {
        let tasks = BackgroundTasks::new();
        let cache = Arc::new(MemoryResponseCache::new(8, 1 << 20));
        let edge = edge(cache.clone(), &tasks);
        let req = incoming(Method::GET, "/esma-target", None).await;

        let (_, status) = edge
            .with_cache(&req, false, |_| async { public("x", "private, max-age=600") })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Miss);

        let (_, status) = edge
            .with_cache(&req, false, |_| async {
                let mut response = public("", "public, max-age=600")?;
                *response.status_mut() = StatusCode::FOUND;
                Ok(response)
            })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert!(tasks.drain(Duration::from_secs(5)).await);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn head_requests_get_headers_only() {
        let tasks = BackgroundTasks::new();
        let cache = Arc::new(MemoryResponseCache::new(8, 1 << 20));
        let edge = edge(cache.clone(), &tasks);
        let head = incoming(Method::HEAD, "/react@18.2.0/es2022/react.mjs", None).await;

        let (response, _) = edge
            .with_cache(&head, false, |_| async {
                public("body", "public, max-age=31536000, immutable")
            })
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(buffer(response.into_body()).await.unwrap().is_empty());
        assert!(tasks.drain(Duration::from_secs(5)).await);
        assert_eq!(cache.len(), 1);

        let (response, status) = edge
            .with_cache(&head, false, |_| async { public("unused", "no-store") })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Hit);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=31536000, immutable"
        );
    }

    #[tokio::test]
    async fn disabled_cache_always_fetches() {
        let tasks = BackgroundTasks::new();
        let edge = EdgeCache::new(None, None, tasks.clone());
        let req = incoming(Method::GET, "/x@1.0.0/es2022/x.mjs", None).await;
        let (response, status) = edge
            .with_cache(&req, false, |_| async { public("a", "public, max-age=600") })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(buffer(response.into_body()).await.unwrap(), "a");
    }

    #[tokio::test]
    async fn real_origin_partitions_the_key() {
        let tasks = BackgroundTasks::new();
        let edge = edge(Arc::new(MemoryResponseCache::new(8, 1 << 20)), &tasks);
        let request = Request::builder()
            .uri("/x@1.0.0/es2022/x.mjs")
            .header(header::HOST, "cdn.example")
            .header("x-real-origin", "https://front.example")
            .body(Body::empty())
            .unwrap();
        let req = IncomingRequest::from_request(request, None).await.unwrap();
        assert_eq!(
            edge.cache_key(&req, None),
            "cdn.example/x@1.0.0/es2022/x.mjs?x-origin=https%3A%2F%2Ffront.example&x-zone-id=z1"
        );
    }
}
