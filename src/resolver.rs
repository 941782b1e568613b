//! Turns unpinned specifiers into redirects to exact versions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use rama::http::{Body, Response, StatusCode};
use deno_semver::{RangeSetOrTag, Version, VersionReq};
use serde::Deserialize;
use serde::de::IgnoredAny;

use crate::error::RequestError;
use crate::npmrc::Npmrc;
use crate::origin::Registry;
use crate::proxy::response::{package_not_found, redirect, respond_text};
use crate::specifier::PackageSpecifier;

#[derive(Debug, Default, Deserialize)]
struct PackageDocument {
    #[serde(default, rename = "dist-tags")]
    dist_tags: HashMap<String, String>,
    #[serde(default)]
    versions: BTreeMap<String, IgnoredAny>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionManifest {
    types: Option<String>,
    typings: Option<String>,
    main: Option<String>,
}

#[derive(Clone)]
pub struct Resolver {
    npmrc: Arc<Npmrc>,
    registry: Arc<dyn Registry>,
}

impl Resolver {
    pub fn new(npmrc: Arc<Npmrc>, registry: Arc<dyn Registry>) -> Self {
        Self { npmrc, registry }
    }

    pub fn npmrc(&self) -> &Npmrc {
        &self.npmrc
    }

    /// Looks the package up and answers with a 302 to
    /// `{origin}/{*}{name}@{version}{&extra}{sub_path}{search}`.
    pub async fn resolve(
        &self,
        spec: &PackageSpecifier,
        origin: &str,
        search: &str,
    ) -> Result<Response<Body>> {
        let name = spec.full_name();
        let registry = self.npmrc.registry_for(&name);
        let reply = self
            .registry
            .get(registry, &name)
            .await
            .with_context(|| format!("fetching package info for {name}"))?;

        if matches!(reply.status, StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED) {
            return Ok(package_not_found(&name));
        }
        if !reply.status.is_success() {
            let detail = String::from_utf8_lossy(&reply.body);
            return Ok(respond_text(
                reply.status,
                &format!("Failed to get package info: {detail}"),
            ));
        }

        let document: PackageDocument = serde_json::from_slice(&reply.body)
            .with_context(|| format!("parsing package info for {name}"))?;
        let version = pick_version(&document, &spec.version)?.ok_or(RequestError::VersionNotFound)?;

        let marker = if spec.external_all { "*" } else { "" };
        let extra = if spec.extra_query.is_empty() {
            String::new()
        } else {
            format!("&{}", spec.extra_query)
        };
        let location = format!(
            "{origin}/{marker}{}@{version}{extra}{}{search}",
            spec.public_name(),
            spec.sub_path
        );
        tracing::debug!(package = %name, constraint = %spec.version, %version, "resolved version");
        redirect(&location, StatusCode::FOUND)
    }

    /// `/@types/<pkg>@<version>` points at the declaration entry of that
    /// version's manifest.
    pub async fn types_redirect(&self, spec: &PackageSpecifier, origin: &str) -> Result<Response<Body>> {
        let name = spec.full_name();
        let registry = self.npmrc.registry_for(&name);
        let reply = self
            .registry
            .get(registry, &format!("{name}/{}", spec.version))
            .await
            .with_context(|| format!("fetching manifest for {name}@{}", spec.version))?;

        if matches!(reply.status, StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED) {
            return Ok(package_not_found(&name));
        }
        if !reply.status.is_success() {
            let detail = String::from_utf8_lossy(&reply.body);
            return Ok(respond_text(
                reply.status,
                &format!("Failed to get package info: {detail}"),
            ));
        }

        let manifest: VersionManifest = serde_json::from_slice(&reply.body)
            .with_context(|| format!("parsing manifest for {name}@{}", spec.version))?;
        let entry = [manifest.types, manifest.typings, manifest.main]
            .into_iter()
            .flatten()
            .find(|entry| !entry.is_empty())
            .unwrap_or_else(|| "index.d.ts".to_string());
        let entry = entry.trim_start_matches("./").trim_start_matches('/');
        redirect(
            &format!("{origin}/{name}@{}/{entry}", spec.version),
            StatusCode::MOVED_PERMANENTLY,
        )
    }
}

/// npm refuses version numbers above `Number.MAX_SAFE_INTEGER`.
const MAX_SAFE_COMPONENT: u64 = (1 << 53) - 1;

/// Picks the version a constraint resolves to:
/// 1. a matching dist-tag (`latest` when the constraint is empty),
/// 2. for an empty constraint, the newest stable (else newest) version,
/// 3. the newest version satisfying the range; pre-releases only count
///    when the constraint mentions one.
fn pick_version(document: &PackageDocument, constraint: &str) -> Result<Option<String>, RequestError> {
    let tag = if constraint.is_empty() { "latest" } else { constraint };
    if let Some(version) = document.dist_tags.get(tag) {
        return Ok(Some(version.clone()));
    }

    let mut versions: Vec<Version> = document
        .versions
        .keys()
        .filter_map(|v| Version::parse_from_npm(v).ok())
        .collect();
    versions.sort();

    if constraint.is_empty() {
        return Ok(versions
            .iter()
            .rev()
            .find(|v| v.pre.is_empty())
            .or_else(|| versions.last())
            .map(Version::to_string));
    }

    let invalid = || RequestError::InvalidVersion(constraint.to_string());
    if has_oversized_component(constraint) {
        return Err(invalid());
    }
    let req = VersionReq::parse_from_npm(constraint).map_err(|_| invalid())?;
    // tags were looked up above; an unknown one is not a version
    let RangeSetOrTag::RangeSet(range) = req.inner() else {
        return Err(invalid());
    };
    let include_pre = constraint.contains('-');
    Ok(versions
        .iter()
        .rev()
        .filter(|v| include_pre || v.pre.is_empty())
        .find(|v| range.satisfies(v))
        .map(Version::to_string))
}

/// Any run of digits npm itself would reject as a version number.
fn has_oversized_component(constraint: &str) -> bool {
    constraint
        .split(|c: char| !c.is_ascii_digit())
        .filter(|digits| !digits.is_empty())
        .any(|digits| digits.parse::<u64>().map_or(true, |n| n > MAX_SAFE_COMPONENT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NpmConfig;
    use crate::origin::RegistryReply;
    use crate::specifier;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use rama::http::header;

    #[derive(Default)]
    struct FakeRegistry {
        docs: HashMap<String, (StatusCode, String)>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeRegistry {
        fn with(mut self, url: &str, status: StatusCode, body: &str) -> Self {
            self.docs.insert(url.to_string(), (status, body.to_string()));
            self
        }
    }

    #[async_trait]
    impl Registry for FakeRegistry {
        async fn get(&self, registry: &crate::npmrc::NpmRegistry, path: &str) -> Result<RegistryReply> {
            let url = registry.url_for(path);
            self.seen.lock().push(url.clone());
            let (status, body) = self
                .docs
                .get(&url)
                .cloned()
                .unwrap_or((StatusCode::NOT_FOUND, String::new()));
            Ok(RegistryReply {
                status,
                body: Bytes::from(body),
            })
        }
    }

    const REACT: &str = r#"{
        "dist-tags": {"latest": "18.2.0", "next": "19.0.0-rc.1"},
        "versions": {"17.0.2": {}, "18.1.0": {}, "18.2.0": {}, "19.0.0-rc.1": {}, "junk": {}}
    }"#;

    fn resolver(registry: FakeRegistry) -> Resolver {
        Resolver::new(Arc::new(Npmrc::from_config(&NpmConfig::default())), Arc::new(registry))
    }

    fn react_registry() -> FakeRegistry {
        FakeRegistry::default().with(
            "https://registry.npmjs.org/react",
            StatusCode::OK,
            REACT,
        )
    }

    async fn location(resolver: &Resolver, path: &str, search: &str) -> String {
        let parsed = specifier::parse(path, search.trim_start_matches('?')).unwrap();
        let response = resolver
            .resolve(&parsed.specifier, "https://cdn.example", search)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=600");
        response.headers()[header::LOCATION].to_str().unwrap().to_string()
    }

    fn doc(json: &str) -> PackageDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn dist_tags_win() {
        let document = doc(REACT);
        assert_eq!(pick_version(&document, "").unwrap().as_deref(), Some("18.2.0"));
        assert_eq!(pick_version(&document, "next").unwrap().as_deref(), Some("19.0.0-rc.1"));
    }

    #[test]
    fn empty_constraint_without_latest_prefers_stable() {
        let document = doc(r#"{"versions": {"1.0.0": {}, "1.1.0": {}, "2.0.0-beta.1": {}}}"#);
        assert_eq!(pick_version(&document, "").unwrap().as_deref(), Some("1.1.0"));

        let document = doc(r#"{"versions": {"2.0.0-alpha": {}, "2.0.0-beta.1": {}}}"#);
        assert_eq!(pick_version(&document, "").unwrap().as_deref(), Some("2.0.0-beta.1"));
    }

    #[test]
    fn ranges_pick_newest_match() {
        let document = doc(REACT);
        assert_eq!(pick_version(&document, "^18").unwrap().as_deref(), Some("18.2.0"));
        assert_eq!(pick_version(&document, "~18.1").unwrap().as_deref(), Some("18.1.0"));
        assert_eq!(pick_version(&document, "17").unwrap().as_deref(), Some("17.0.2"));
        assert_eq!(pick_version(&document, ">=19").unwrap(), None);
        assert_eq!(
            pick_version(&document, ">=19.0.0-rc.0").unwrap().as_deref(),
            Some("19.0.0-rc.1")
        );
    }

    #[test]
    fn malformed_range_is_rejected() {
        let document = doc(REACT);
        assert_eq!(
            pick_version(&document, "banana"),
            Err(RequestError::InvalidVersion("banana".into()))
        );
    }

    #[test]
    fn huge_version_numbers_are_rejected() {
        let document = doc(REACT);
        for constraint in [
            "^18446744073709551615",
            "~18446744073709551615",
            "<=18446744073709551615",
            ">18446744073709551615",
            "^99999999999999999999",
            "^9007199254740992",
        ] {
            assert_eq!(
                pick_version(&document, constraint),
                Err(RequestError::InvalidVersion(constraint.into())),
                "{constraint}"
            );
        }
        assert_eq!(pick_version(&document, "^9007199254740991").unwrap(), None);
    }

    #[tokio::test]
    async fn huge_caret_range_is_a_bad_request() {
        let resolver = resolver(react_registry());
        let parsed = specifier::parse("/react@%5E18446744073709551615", "").unwrap();
        let err = resolver
            .resolve(&parsed.specifier, "https://cdn.example", "")
            .await
            .unwrap_err();
        let request_error = err.downcast_ref::<RequestError>().unwrap();
        assert_eq!(request_error.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn redirects_to_latest() {
        let resolver = resolver(react_registry());
        assert_eq!(
            location(&resolver, "/react", "").await,
            "https://cdn.example/react@18.2.0"
        );
    }

    #[tokio::test]
    async fn redirect_keeps_marker_extra_query_sub_path_and_search() {
        let resolver = resolver(react_registry());
        assert_eq!(
            location(&resolver, "/*react@^18&dev/jsx-runtime", "?target=es2020").await,
            "https://cdn.example/*react@18.2.0&dev/jsx-runtime?target=es2020"
        );
    }

    #[tokio::test]
    async fn jsr_packages_use_jsr_registry_and_public_name() {
        let registry = FakeRegistry::default().with(
            "https://npm.jsr.io/@jsr/std__encoding",
            StatusCode::OK,
            r#"{"dist-tags": {"latest": "1.0.5"}, "versions": {"1.0.5": {}}}"#,
        );
        let resolver = resolver(registry);
        assert_eq!(
            location(&resolver, "/jsr/@std/encoding/base64", "").await,
            "https://cdn.example/jsr/@std/encoding@1.0.5/base64"
        );
    }

    #[tokio::test]
    async fn missing_package_is_a_js_module() {
        let resolver = resolver(FakeRegistry::default());
        let spec = specifier::parse("/nope", "").unwrap().specifier;
        let response = resolver.resolve(&spec, "https://cdn.example", "").await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/javascript; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "private, no-cache, no-store, must-revalidate"
        );
    }

    #[tokio::test]
    async fn unauthorized_looks_like_missing() {
        let registry = FakeRegistry::default().with(
            "https://registry.npmjs.org/private-pkg",
            StatusCode::UNAUTHORIZED,
            "",
        );
        let spec = specifier::parse("/private-pkg", "").unwrap().specifier;
        let response = resolver(registry)
            .resolve(&spec, "https://cdn.example", "")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_registry_failures_are_relayed() {
        let registry = FakeRegistry::default().with(
            "https://registry.npmjs.org/react",
            StatusCode::BAD_GATEWAY,
            "upstream down",
        );
        let spec = specifier::parse("/react", "").unwrap().specifier;
        let response = resolver(registry)
            .resolve(&spec, "https://cdn.example", "")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = crate::tee::buffer(response.into_body()).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"Failed to get package info: upstream down"));
    }

    #[tokio::test]
    async fn unsatisfied_range_is_version_not_found() {
        let spec = specifier::parse("/react@^99", "").unwrap().specifier;
        let err = resolver(react_registry())
            .resolve(&spec, "https://cdn.example", "")
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<RequestError>(),
            Some(&RequestError::VersionNotFound)
        );
    }

    #[tokio::test]
    async fn scoped_registry_override_is_used() {
        let npmrc = Npmrc::from_json(
            r#"{"registries": {"@corp": {"registry": "https://corp.example/npm", "token": "t"}}}"#,
        )
        .unwrap();
        let registry = Arc::new(FakeRegistry::default().with(
            "https://corp.example/@corp/ui",
            StatusCode::OK,
            r#"{"dist-tags": {"latest": "2.0.0"}}"#,
        ));
        let resolver = Resolver::new(Arc::new(npmrc), registry.clone());
        assert_eq!(
            location(&resolver, "/@corp/ui", "").await,
            "https://cdn.example/@corp/ui@2.0.0"
        );
        assert_eq!(registry.seen.lock().as_slice(), ["https://corp.example/@corp/ui"]);
    }

    #[tokio::test]
    async fn types_redirect_reads_version_manifest() {
        let registry = FakeRegistry::default().with(
            "https://registry.npmjs.org/@types/react/18.2.0",
            StatusCode::OK,
            r#"{"name": "@types/react", "types": "./index.d.ts"}"#,
        );
        let spec = specifier::parse("/@types/react@18.2.0", "").unwrap().specifier;
        let response = resolver(registry)
            .types_redirect(&spec, "https://cdn.example")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://cdn.example/@types/react@18.2.0/index.d.ts"
        );
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=31536000, immutable"
        );
    }

    #[tokio::test]
    async fn types_redirect_defaults_to_index() {
        let registry = FakeRegistry::default().with(
            "https://registry.npmjs.org/@types/node/20.0.0",
            StatusCode::OK,
            r#"{"name": "@types/node"}"#,
        );
        let spec = specifier::parse("/@types/node@20.0.0", "").unwrap().specifier;
        let response = resolver(registry)
            .types_redirect(&spec, "https://cdn.example")
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://cdn.example/@types/node@20.0.0/index.d.ts"
        );
    }
}
