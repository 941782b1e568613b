//! Cross-origin policy.
//!
//! Without an allow-list every origin gets `*`. With one, only listed
//! origins are echoed back and referers from elsewhere are refused.

use std::collections::HashSet;

use rama::http::{Body, HeaderMap, HeaderValue, Response, StatusCode, header};
use url::Url;

const ALLOW_METHODS: &str = "HEAD, GET, POST";
const PREFLIGHT_MAX_AGE: &str = "86400";

#[derive(Debug, Clone, Default)]
pub struct Cors {
    allowed: Option<HashSet<String>>,
}

impl Cors {
    /// Each host name allows both its `https://` and `http://` origins.
    pub fn new(allow_list: &[String]) -> Self {
        if allow_list.is_empty() {
            return Self { allowed: None };
        }
        let allowed = allow_list
            .iter()
            .flat_map(|host| [format!("https://{host}"), format!("http://{host}")])
            .collect();
        Self {
            allowed: Some(allowed),
        }
    }

    pub fn is_open(&self) -> bool {
        self.allowed.is_none()
    }

    /// A request without a `Referer` is let through; one whose referer
    /// origin is not listed is not.
    pub fn allows_referer(&self, referer: Option<&str>) -> bool {
        let Some(allowed) = &self.allowed else {
            return true;
        };
        let Some(referer) = referer.filter(|r| !r.is_empty()) else {
            return true;
        };
        Url::parse(referer)
            .ok()
            .map(|url| url.origin().ascii_serialization())
            .is_some_and(|origin| allowed.contains(&origin))
    }

    /// Adds the CORS headers for a request from `origin` to `headers`.
    /// Returns whether an `Access-Control-Allow-Origin` header was set.
    pub fn apply(&self, headers: &mut HeaderMap, origin: Option<&str>) -> bool {
        match &self.allowed {
            None => {
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                );
            }
            Some(allowed) => {
                let Some(value) = origin
                    .filter(|o| allowed.contains(*o))
                    .and_then(|o| HeaderValue::from_str(o).ok())
                else {
                    return false;
                };
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
                headers.append(header::VARY, HeaderValue::from_static("Origin"));
            }
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        true
    }

    /// Answers an `OPTIONS` request.
    pub fn preflight(&self, request_headers: &HeaderMap) -> Response<Body> {
        let origin = request_headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok());
        let mut response = Response::new(Body::empty());
        if !self.apply(response.headers_mut(), origin) {
            *response.status_mut() = StatusCode::FORBIDDEN;
            return response;
        }
        *response.status_mut() = StatusCode::NO_CONTENT;
        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE),
        );
        if let Some(requested) = request_headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
            headers.append(
                header::VARY,
                HeaderValue::from_static("Access-Control-Allow-Headers"),
            );
        }
        response
    }
}
