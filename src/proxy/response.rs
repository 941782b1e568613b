use anyhow::Result;
use rama::http::{Body, HeaderValue, Response, StatusCode, header};

use crate::headers::{CC_IMMUTABLE, CC_NO_STORE};

/// Redirect cache lifetime for non-permanent redirects (resolved versions).
pub const REDIRECT_MAX_AGE: &str = "public, max-age=600";

/// Responds with JSON content
pub fn respond_json(status: StatusCode, body: &str) -> Result<Response<Body>> {
    let mut builder = Response::builder().status(status);
    {
        let headers = builder
            .headers_mut()
            .expect("headers available while building response");
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from_str(&body.len().to_string())?,
        );
    }
    builder
        .body(Body::from(body.to_owned()))
        .map_err(Into::into)
}

/// Responds with plain text
pub fn respond_text(status: StatusCode, body: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_owned()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Status-only response with no body.
pub fn respond_empty(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

/// `301` is cached forever, `302` for ten minutes.
pub fn redirect(location: &str, status: StatusCode) -> Result<Response<Body>> {
    let mut response = respond_empty(status);
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, HeaderValue::from_str(location)?);
    let cache_control = if status == StatusCode::MOVED_PERMANENTLY {
        CC_IMMUTABLE
    } else {
        REDIRECT_MAX_AGE
    };
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
    Ok(response)
}

/// A JavaScript module that throws on import, so a broken `import` fails
/// with a readable message instead of a parse error.
pub fn package_not_found(package: &str) -> Response<Body> {
    let body = format!(
        "/* sluice - error */\nthrow new Error(\"[sluice] \" + \"npm: package '{package}' not found\");\nexport default null;"
    );
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::NOT_FOUND;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/javascript; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CC_NO_STORE));
    response
}
