mod builtin;
pub mod response;
pub mod types;


use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use rama::{
    Service,
    error::BoxError,
    http::{Body, Method, Request, Response, StatusCode, header},
};
use tracing::{error, info};

use crate::config::Config;
use crate::content_type::is_asset_extension;
use crate::cors::Cors;
use crate::edge::EdgeCache;
use crate::error::RequestError;
use crate::legacy::{LegacyWorker, is_legacy_request};
use crate::purge::{PURGE_PATH, purge};
use crate::query::QueryParams;
use crate::resolver::Resolver;
use crate::specifier::{ParsedRequest, is_dts_file, parse};
use crate::storage::StorageTier;
use crate::target::{negotiate, target_from_user_agent};

pub use builtin::{BUILD_ETAG, BUILD_VERSION};
pub use types::{CacheStatus, IncomingRequest, RequestContext};

/// Main proxy service
#[derive(Clone)]
pub struct SluiceProxy {
    cors: Arc<Cors>,
    raw_host: Option<String>,
    max_body_bytes: usize,
    source_map: bool,
    resolver: Resolver,
    edge: EdgeCache,
    storage: StorageTier,
    legacy: Option<Arc<dyn LegacyWorker>>,
}

impl SluiceProxy {
    pub fn new(
        config: &Config,
        resolver: Resolver,
        edge: EdgeCache,
        storage: StorageTier,
        legacy: Option<Arc<dyn LegacyWorker>>,
    ) -> Self {
        Self {
            cors: Arc::new(Cors::new(&config.cors.allow_list)),
            raw_host: config.server.raw_host.clone(),
            max_body_bytes: config.server.max_body_bytes,
            source_map: config.build.source_map,
            resolver,
            edge,
            storage,
            legacy,
        }
    }

    /// Answers one request: preflight and referer policy first, then the
    /// router, with client errors mapped to their status and CORS headers
    /// added to whatever comes out.
    pub async fn respond(
        &self,
        req: Request<Body>,
        ctx: &mut RequestContext,
    ) -> Result<Response<Body>> {
        if req.method() == Method::OPTIONS {
            return Ok(self.cors.preflight(req.headers()));
        }

        let origin = req
            .headers()
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let referer = req
            .headers()
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok());
        if !self.cors.allows_referer(referer) {
            tracing::debug!(referer = ?referer, "referer not in allow list");
            return Ok(response::respond_text(
                StatusCode::FORBIDDEN,
                &RequestError::Forbidden.to_string(),
            ));
        }

        let incoming = match IncomingRequest::from_request_limited(
            req,
            self.raw_host.as_deref(),
            self.max_body_bytes,
        )
        .await
        {
            Ok(incoming) => incoming,
            Err(err) => {
                let Some(request_error) = err.downcast_ref::<RequestError>() else {
                    return Err(err);
                };
                let mut response = request_error_response(request_error);
                self.cors.apply(response.headers_mut(), origin.as_deref());
                return Ok(response);
            }
        };
        let mut response = match self.route(&incoming, ctx).await {
            Ok(response) => response,
            Err(err) => match err.downcast_ref::<RequestError>() {
                Some(request_error) => request_error_response(request_error),
                None => {
                    ctx.cache = CacheStatus::Error;
                    error!(
                        method = %ctx.method,
                        path = %ctx.path,
                        error = ?err,
                        "request failed"
                    );
                    self.storage
                        .record_error(&incoming.url(), &incoming.headers, &err);
                    response::respond_text(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
                }
            },
        };
        self.cors.apply(response.headers_mut(), origin.as_deref());
        Ok(response)
    }

    async fn route(&self, req: &IncomingRequest, ctx: &mut RequestContext) -> Result<Response<Body>> {
        let path = req.path.as_str();

        if builtin::is_banned(path) {
            return self
                .cached(req, ctx, false, |_| async { Ok(builtin::banned()) })
                .await;
        }

        match path {
            "/error.js" => {
                let uri = format!("{path}{}", req.search);
                return self
                    .cached(req, ctx, false, move |_| self.passthrough(req, uri))
                    .await;
            }
            "/esma-target" => {
                return Ok(builtin::target_report(target_from_user_agent(
                    req.user_agent(),
                )));
            }
            "/status.json" => return self.passthrough(req, path.to_string()).await,
            _ => {}
        }

        if builtin::is_runtime_script(path) {
            if !builtin::is_runtime_chunk(path)
                && builtin::is_fresh(req.header(header::IF_NONE_MATCH))
            {
                return Ok(builtin::not_modified());
            }
            let vary_ua = !path.ends_with(".ts");
            return self
                .cached(req, ctx, vary_ua, move |target| async move {
                    let query = builtin::runtime_query(&req.query, target);
                    self.storage.fetch_build(req, path, &query).await
                })
                .await;
        }

        if req.method == Method::POST {
            return match path {
                "/transform" | "/bundle" => self.passthrough(req, path.to_string()).await,
                PURGE_PATH => purge(req, &self.storage).await,
                _ => Err(RequestError::NotFound.into()),
            };
        }
        if req.method != Method::GET && req.method != Method::HEAD {
            return Err(RequestError::MethodNotAllowed.into());
        }

        if path == "/robots.txt" {
            return Err(RequestError::NotFound.into());
        }
        if path == "/" || path == "/favicon.ico" || path.starts_with("/embed/") {
            return self
                .passthrough(req, format!("{path}{}", req.search))
                .await;
        }

        // singleton modules produced by the tsx runtime
        if path.starts_with("/+") && (path.ends_with(".mjs") || path.ends_with(".mjs.map")) {
            return self
                .cached(req, ctx, false, move |_| {
                    self.storage.fetch_build(req, path, "")
                })
                .await;
        }

        if let Some(legacy) = &self.legacy
            && is_legacy_request(path, &req.query)
        {
            tracing::debug!(%path, "delegating to legacy worker");
            return legacy.fetch(req).await;
        }

        self.route_package(req, ctx).await
    }

    async fn route_package(
        &self,
        req: &IncomingRequest,
        ctx: &mut RequestContext,
    ) -> Result<Response<Body>> {
        let raw_query = req.search.strip_prefix('?').unwrap_or("");
        let ParsedRequest {
            specifier: spec,
            path,
            query,
        } = parse(&req.path, raw_query)?;

        let mut rewritten = req.clone();
        if query != QueryParams::parse(raw_query) {
            rewritten.search = query.to_search();
        }
        rewritten.path = path;
        rewritten.query = query;
        let req = &rewritten;

        if spec.full_module_path && spec.sub_path.ends_with(".map") && !self.source_map {
            return Err(RequestError::SourceMapDisabled.into());
        }

        // the origin redirects to a tag or commit
        if spec.github && !spec.is_pinned_github() {
            let uri = format!("{}{}", req.path, req.search);
            return self
                .cached(req, ctx, false, move |_| self.passthrough(req, uri))
                .await;
        }

        if !spec.github && !spec.is_fixed_version() {
            return self
                .cached(req, ctx, false, |_| {
                    self.resolver.resolve(&spec, &req.origin, &req.search)
                })
                .await;
        }

        let full_name = spec.full_name();
        if full_name.starts_with("@types/") && spec.sub_path.is_empty() {
            return self
                .cached(req, ctx, false, |_| {
                    self.resolver.types_redirect(&spec, &req.origin)
                })
                .await;
        }

        if !spec.github
            && spec.sub_path.is_empty()
            && let Some(entry) = builtin::css_package_entry(&full_name)
        {
            return response::redirect(
                &format!("{}/{full_name}@{}/{entry}", req.origin, spec.version),
                StatusCode::MOVED_PERMANENTLY,
            );
        }

        if req.query.has("css") && spec.sub_path.is_empty() {
            let target = negotiate(req.query.get("target"), req.user_agent()).target;
            return response::redirect(
                &format!(
                    "{}{}/{target}/{}.css",
                    req.origin,
                    spec.pinned_path(false),
                    spec.name
                ),
                StatusCode::MOVED_PERMANENTLY,
            );
        }

        // `/pkg@1.0.0/es2022/foo.wasm` is the plain `foo.wasm` on the origin
        if spec.full_module_path
            && (spec.sub_path.ends_with(".wasm") || spec.sub_path.ends_with(".json"))
        {
            let uri = req.path.clone();
            return self
                .cached(req, ctx, false, move |_| self.passthrough(req, uri))
                .await;
        }

        if !spec.sub_path.is_empty() {
            let ext = spec.extension();
            if ext == "wasm" && req.query.has("module") {
                let uri = format!("{}?module", req.path);
                return self
                    .cached(req, ctx, false, move |_| self.passthrough(req, uri))
                    .await;
            }
            if is_asset_extension(ext) {
                let asset_path = format!("{}{}", spec.pinned_path(false), spec.sub_path);
                return self
                    .cached(req, ctx, false, move |_| async move {
                        self.storage.fetch_asset(req, &asset_path).await
                    })
                    .await;
            }
        }

        if spec.full_module_path || is_dts_file(&spec.sub_path) {
            let build_path = format!("{}{}", spec.pinned_path(false), spec.sub_path);
            return self
                .cached(req, ctx, false, move |_| async move {
                    self.storage.fetch_build(req, &build_path, "").await
                })
                .await;
        }

        let build_path = format!("{}{}", spec.pinned_path(true), spec.sub_path);
        self.cached(req, ctx, true, move |target| async move {
            let mut query = req.query.normalized();
            if let Some(target) = target {
                query.set("target", target);
            }
            self.storage
                .fetch_build(req, &build_path, &query.to_search())
                .await
        })
        .await
    }

    /// Runs `fetcher` behind the edge cache and records the cache outcome.
    async fn cached<F, Fut>(
        &self,
        req: &IncomingRequest,
        ctx: &mut RequestContext,
        vary_ua: bool,
        fetcher: F,
    ) -> Result<Response<Body>>
    where
        F: FnOnce(Option<&'static str>) -> Fut,
        Fut: Future<Output = Result<Response<Body>>>,
    {
        let (response, status) = self.edge.with_cache(req, vary_ua, fetcher).await?;
        ctx.cache = status;
        Ok(response)
    }

    async fn passthrough(&self, req: &IncomingRequest, uri: String) -> Result<Response<Body>> {
        let upstream = self.storage.origin().fetch(req.origin_request(uri)).await?;
        Ok(upstream.into_response())
    }
}

fn request_error_response(err: &RequestError) -> Response<Body> {
    response::respond_text(err.status(), &err.to_string())
}

impl Service<Request<Body>> for SluiceProxy {
    type Output = Response<Body>;
    type Error = BoxError;

    async fn serve(&self, req: Request<Body>) -> Result<Self::Output, Self::Error> {
        let mut ctx = RequestContext::from_request(&req);

        let result = self.respond(req, &mut ctx).await;

        let duration_ms = ctx.start.elapsed().as_millis();
        match &result {
            Ok(resp) => {
                info!(
                    method = %ctx.method,
                    path = %ctx.path,
                    response_code = resp.status().as_u16(),
                    duration_ms,
                    cache_status = %ctx.cache,
                    "request handled"
                );
            }
            Err(err) => {
                error!(
                    method = %ctx.method,
                    path = %ctx.path,
                    duration_ms,
                    cache_status = %CacheStatus::Error,
                    error = ?err,
                    "request failed"
                );
            }
        }

        result.map_err(Into::into)
    }
}
