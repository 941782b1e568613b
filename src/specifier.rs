//! Request path parsing.
//!
//! Turns `/[*]{@scope/}name{@version}{/sub/path}` (plus the `/gh/` and
//! `/jsr/` registry forms) into a [`PackageSpecifier`]. Parsing is pure so the
//! same input always yields the same cache and storage keys.

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::error::RequestError;
use crate::query::QueryParams;
use crate::target::is_known_target;

static NAMING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-+.$!*~()]*$").expect("static naming pattern")
});
static FULL_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+[\w\-.+]*$").expect("static version pattern")
});
static COMMITISH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{10,}$").expect("static commit pattern"));
static LOC_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\d+:\d+$").expect("static location pattern"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSpecifier {
    /// `@scope` for npm packages, the repository owner for GitHub ones.
    pub scope: Option<String>,
    pub name: String,
    /// Version or range as written, without a leading `=`/`v` (npm only).
    pub version: String,
    /// Empty or starting with `/`.
    pub sub_path: String,
    /// `&key=value` parameters that were carried in the version segment.
    pub extra_query: String,
    pub github: bool,
    pub jsr: bool,
    pub external_all: bool,
    /// The sub-path addresses a concrete build (`/es2022/react.mjs`).
    pub full_module_path: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub specifier: PackageSpecifier,
    /// Decoded request path after the `/jsx-runtime` fix-up, before any
    /// registry rewrite; the path cache keys are built from.
    pub path: String,
    /// Request query after the `/jsx-runtime` fix-up and extra-query merge.
    pub query: QueryParams,
}

impl PackageSpecifier {
    /// `@scope/name`, `owner/repo` or `name`.
    pub fn full_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{scope}/{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Exact `x.y.z` version (with optional pre-release/build suffix).
    pub fn is_fixed_version(&self) -> bool {
        is_full_version(&self.version)
    }

    /// GitHub specifiers are immutable once they name a commit or a tag.
    pub fn is_pinned_github(&self) -> bool {
        !self.version.is_empty()
            && (COMMITISH.is_match(&self.version)
                || is_full_version(self.version.strip_prefix('v').unwrap_or(&self.version)))
    }

    /// Path prefix for the registry the package lives in.
    pub fn registry_prefix(&self) -> &'static str {
        if self.github { "/gh" } else { "" }
    }

    /// `/{gh}/{*}name@version` without the sub-path.
    pub fn pinned_path(&self, with_marker: bool) -> String {
        let marker = if with_marker && self.external_all { "*" } else { "" };
        format!(
            "{}/{}{}@{}",
            self.registry_prefix(),
            marker,
            self.full_name(),
            self.version
        )
    }

    /// Public spelling of the package name used in redirects: internal
    /// `@jsr/scope__name` becomes `jsr/@scope/name` unless a concrete build
    /// path is being addressed.
    pub fn public_name(&self) -> String {
        let full = self.full_name();
        if !self.full_module_path
            && let Some(rest) = full.strip_prefix("@jsr/")
        {
            return format!("jsr/@{}", rest.replacen("__", "/", 1));
        }
        full
    }

    /// Extension of the last sub-path segment, without the dot.
    pub fn extension(&self) -> &str {
        file_extension(&self.sub_path)
    }
}

pub fn is_full_version(version: &str) -> bool {
    FULL_VERSION.is_match(version)
}

pub fn is_dts_file(path: &str) -> bool {
    path.ends_with(".d.ts") || path.ends_with(".d.mts")
}

/// Text after the last `.` of the final path segment, or an empty string.
pub fn file_extension(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// A sub-path is a full module path when it is scoped to a build target,
/// optionally behind an `X-…` build-args segment.
pub fn has_target_segment(segments: &[&str]) -> bool {
    match segments {
        [] | [_] => false,
        [first, second, _, ..] if first.starts_with("X-") => is_known_target(second),
        [first, ..] => is_known_target(first),
    }
}

/// Parses a request path and query string (without `?`).
pub fn parse(pathname: &str, raw_query: &str) -> Result<ParsedRequest, RequestError> {
    let mut pathname = pathname.to_string();
    let mut raw_query = raw_query.to_string();

    if pathname != "/" && pathname.ends_with('/') {
        pathname.pop();
    }

    if pathname.contains('%') {
        pathname = percent_decode_str(&pathname)
            .decode_utf8_lossy()
            .into_owned();
    }

    // import maps sometimes resolve `pkg?dev/jsx-runtime`
    if raw_query.ends_with("/jsx-runtime") || raw_query.ends_with("/jsx-dev-runtime") {
        if let Some((query, runtime)) = raw_query.rsplit_once('/') {
            pathname = format!("{pathname}/{runtime}");
            raw_query = query.to_string();
        }
    }

    let request_path = pathname.clone();

    if pathname.contains(':') {
        pathname = LOC_SUFFIX.replace(&pathname, "").into_owned();
    }

    let github = pathname.starts_with("/gh/");
    if github {
        pathname = pathname[3..].to_string();
    } else if pathname.starts_with("/jsr/@") {
        let segments: Vec<&str> = pathname.split('/').collect();
        if segments.len() < 4 {
            return Err(RequestError::InvalidPath);
        }
        let mut rewritten = format!("/@jsr/{}__{}", &segments[2][1..], segments[3]);
        if segments.len() > 4 {
            rewritten.push('/');
            rewritten.push_str(&segments[4..].join("/"));
        }
        pathname = rewritten;
    }

    let external_all = pathname.starts_with("/*");
    if external_all {
        pathname = format!("/{}", &pathname[2..]);
    }

    let segments: Vec<&str> = pathname.split('/').skip(1).collect();
    let (scope, name_and_version, rest) = if github || pathname.starts_with("/@") {
        match segments.as_slice() {
            [scope, name, rest @ ..] => (Some(scope.to_string()), *name, rest),
            [scope] => (Some(scope.to_string()), "", &[][..]),
            [] => (None, "", &[][..]),
        }
    } else {
        match segments.as_slice() {
            [name, rest @ ..] => (None, *name, rest),
            [] => (None, "", &[][..]),
        }
    };

    let (name, version) = name_and_version
        .split_once('@')
        .unwrap_or((name_and_version, ""));
    let (sub_path, full_module_path) = if rest.is_empty() {
        (String::new(), false)
    } else {
        (format!("/{}", rest.join("/")), has_target_segment(rest))
    };

    if let Some(scope) = &scope {
        let bare = if github {
            scope.as_str()
        } else {
            scope.strip_prefix('@').unwrap_or(scope)
        };
        if bare.is_empty() || !NAMING.is_match(bare) {
            return Err(RequestError::InvalidScope(scope.clone()));
        }
    }
    if name.is_empty() {
        return Err(RequestError::InvalidPath);
    }
    if !NAMING.is_match(name) || version.ends_with('.') || version.ends_with('-') {
        return Err(RequestError::InvalidPackageName(name.to_string()));
    }

    let mut query = QueryParams::parse(&raw_query);
    let (mut version, extra_query) = version
        .split_once('&')
        .map(|(v, q)| (v.to_string(), q.to_string()))
        .unwrap_or_else(|| (version.to_string(), String::new()));
    if !github && (version.starts_with('=') || version.starts_with('v')) {
        version.remove(0);
    }
    if !extra_query.is_empty() {
        query.merge_raw(&extra_query);
    }
    if version.ends_with('.') {
        return Err(RequestError::InvalidVersion(version));
    }

    let jsr = !github && scope.as_deref() == Some("@jsr");
    Ok(ParsedRequest {
        specifier: PackageSpecifier {
            scope,
            name: name.to_string(),
            version,
            sub_path,
            extra_query,
            github,
            jsr,
            external_all,
            full_module_path,
        },
        path: request_path,
        query,
    })
}
