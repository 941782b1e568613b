//! Header names and cache-control values shared by the cache tiers.

use rama::http::{HeaderMap, HeaderName, HeaderValue, header};

pub const X_ESM_PATH: HeaderName = HeaderName::from_static("x-esm-path");
pub const X_TYPESCRIPT_TYPES: HeaderName = HeaderName::from_static("x-typescript-types");
pub const X_REAL_ORIGIN: HeaderName = HeaderName::from_static("x-real-origin");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_ZONE_ID: HeaderName = HeaderName::from_static("x-zone-id");
pub const X_NPMRC: HeaderName = HeaderName::from_static("x-npmrc");
pub const X_CONTENT_SOURCE: HeaderName = HeaderName::from_static("x-content-source");

pub const CC_IMMUTABLE: &str = "public, max-age=31536000, immutable";
/// Prefix shared by every response the edge cache may keep.
pub const CC_PUBLIC_PREFIX: &str = "public, max-age=";
pub const CC_NO_STORE: &str = "private, no-cache, no-store, must-revalidate";

/// Copies `names` from `src` into `dst`, replacing existing values.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap, names: &[HeaderName]) {
    for name in names {
        if let Some(value) = src.get(name) {
            dst.insert(name.clone(), value.clone());
        }
    }
}

/// Sets `Access-Control-Expose-Headers` to whichever custom headers are
/// present, or leaves it alone when there are none.
pub fn expose_custom_headers(headers: &mut HeaderMap) {
    let exposed: Vec<&str> = [header::ETAG, X_ESM_PATH, X_TYPESCRIPT_TYPES]
        .iter()
        .filter(|name| headers.contains_key(*name))
        .map(|name| match name.as_str() {
            "etag" => "ETag",
            "x-esm-path" => "X-ESM-Path",
            _ => "X-TypeScript-Types",
        })
        .collect();
    if exposed.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&exposed.join(", ")) {
        headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, value);
    }
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: impl AsRef<str>) -> Option<&'a str> {
    headers.get(name.as_ref()).and_then(|v| v.to_str().ok())
}
