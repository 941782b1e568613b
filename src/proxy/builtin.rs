//! Routes that do not name a package: the landing page, status, the
//! bundled runtime scripts and a few fixed redirects.

use rama::http::{Body, HeaderValue, Response, StatusCode, header};

use crate::headers::CC_IMMUTABLE;
use crate::query::QueryParams;

use super::response::respond_empty;

/// Build generation of the runtime scripts served by the origin.
pub const BUILD_VERSION: u32 = 136;
/// Oldest `?v=` still forwarded for runtime scripts.
pub const MIN_BUILD_VERSION: u32 = 136;
/// Weak ETag shared by every runtime script of this build generation.
pub const BUILD_ETAG: &str = "W/\"v136\"";

const CC_BUILTIN: &str = "public, max-age=86400";
/// `/esma-target` answers are per user agent.
pub const CC_TARGET_REPORT: &str = "private, max-age=600";

/// Stylesheet entry of packages that are nothing but CSS.
const CSS_PACKAGES: [(&str, &str); 3] = [
    ("normalize.css", "normalize.css"),
    ("@unocss/reset", "tailwind.css"),
    ("reset-css", "reset.css"),
];

/// Dot-files and PHP scanner paths.
pub fn is_banned(path: &str) -> bool {
    path.starts_with("/.") || path.ends_with(".php")
}

/// Answer for banned paths; immutable so it settles in the edge cache.
pub fn banned() -> Response<Body> {
    let mut response = respond_empty(StatusCode::NOT_FOUND);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(CC_IMMUTABLE));
    response
}

/// `/run`, `/run.d.ts`, `/tsx` and `/node/*.js`.
pub fn is_runtime_script(path: &str) -> bool {
    matches!(path, "/run" | "/run.d.ts" | "/tsx")
        || (path.starts_with("/node/") && path.ends_with(".js"))
}

/// Chunks are content addressed and never revalidated against the ETag.
pub fn is_runtime_chunk(path: &str) -> bool {
    path.starts_with("/node/chunk-")
}

/// Whether the client already holds this build generation.
pub fn is_fresh(if_none_match: Option<&str>) -> bool {
    if_none_match == Some(BUILD_ETAG)
}

pub fn not_modified() -> Response<Body> {
    let mut response = respond_empty(StatusCode::NOT_MODIFIED);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(CC_BUILTIN));
    response
}

/// Query forwarded for a runtime script: the negotiated target and a `v`
/// within the supported build range. Empty or starting with `?`.
pub fn runtime_query(query: &QueryParams, target: Option<&str>) -> String {
    let mut forwarded = QueryParams::default();
    if let Some(target) = target {
        forwarded.set("target", target);
    }
    if let Some(v) = query.get("v")
        && leading_integer(v).is_some_and(|n| (MIN_BUILD_VERSION..=BUILD_VERSION).contains(&n))
    {
        forwarded.set("v", v);
    }
    forwarded.to_search()
}

/// Digits at the start of `raw`, so `136abc` reads as 136.
fn leading_integer(raw: &str) -> Option<u32> {
    let digits: &str = raw
        .find(|c: char| !c.is_ascii_digit())
        .map_or(raw, |end| &raw[..end]);
    digits.parse().ok()
}

pub fn css_package_entry(package: &str) -> Option<&'static str> {
    CSS_PACKAGES
        .iter()
        .find(|(name, _)| *name == package)
        .map(|(_, entry)| *entry)
}

/// Plain-text body for `/esma-target`.
pub fn target_report(target: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(target.to_string()));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CC_TARGET_REPORT));
    response
}
