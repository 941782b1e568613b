//! Build target negotiation.
//!
//! An explicit `?target=` wins. Otherwise the `User-Agent` is mapped to a
//! runtime (Deno, Node, Bun) or scored against the feature table to find the
//! newest ECMAScript edition the browser fully supports.

pub mod compat;
pub mod user_agent;

use once_cell::sync::Lazy;

use self::compat::{Engine, EngineVersion, unsupported_features};

pub const TARGETS: [&str; 14] = [
    "es2015", "es2016", "es2017", "es2018", "es2019", "es2020", "es2021", "es2022", "es2023",
    "es2024", "esnext", "deno", "denonext", "node",
];

/// Editions considered when scoring browsers, newest first.
const SCORED_EDITIONS: [(&str, u32); 8] = [
    ("es2022", 2022),
    ("es2021", 2021),
    ("es2020", 2020),
    ("es2019", 2019),
    ("es2018", 2018),
    ("es2017", 2017),
    ("es2016", 2016),
    ("es2015", 2015),
];

/// Last Deno release that still gets the legacy `deno` target.
const LAST_LEGACY_DENO: EngineVersion = [1, 33, 1];

static EDITION_BUDGETS: Lazy<Vec<(&'static str, usize)>> = Lazy::new(|| {
    SCORED_EDITIONS
        .iter()
        .map(|(name, year)| (*name, unsupported_features(Engine::Es, [*year, 0, 0]).len()))
        .collect()
});

/// Returns the canonical static name when `candidate` is a known target.
pub fn known_target(candidate: &str) -> Option<&'static str> {
    TARGETS.iter().copied().find(|t| *t == candidate)
}

pub fn is_known_target(candidate: &str) -> bool {
    known_target(candidate).is_some()
}

/// A negotiated build target and whether it was derived from the UA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub target: &'static str,
    pub from_user_agent: bool,
}

/// Picks the build target for a request.
pub fn negotiate(explicit: Option<&str>, user_agent: Option<&str>) -> Negotiated {
    match explicit.and_then(known_target) {
        Some(target) => Negotiated {
            target,
            from_user_agent: false,
        },
        None => Negotiated {
            target: target_from_user_agent(user_agent),
            from_user_agent: true,
        },
    }
}

pub fn target_from_user_agent(user_agent: Option<&str>) -> &'static str {
    let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
        return "esnext";
    };
    if ua.starts_with("curl/") {
        return "esnext";
    }
    if let Some(year) = ua.strip_prefix("ES/")
        && let Some(target) = known_target(&format!("es{year}"))
    {
        return target;
    }
    if let Some(rest) = ua.strip_prefix("Deno/") {
        return match deno_version(rest) {
            Some(version) if version <= LAST_LEGACY_DENO => "deno",
            _ => "denonext",
        };
    }
    if ua == "undici" || ua.starts_with("Node/") || ua.starts_with("Node.js/") || ua.starts_with("Bun/")
    {
        return "node";
    }
    match user_agent::detect_browser(ua) {
        Some((engine, version)) => edition_for(engine, version),
        None => "esnext",
    }
}

fn deno_version(rest: &str) -> Option<EngineVersion> {
    let mut parts = rest.splitn(4, '.');
    let mut version = [0u32; 3];
    for slot in version.iter_mut() {
        let part = parts.next()?;
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        *slot = digits.parse().ok()?;
    }
    Some(version)
}

/// Newest scored edition whose own unsupported-feature count covers the
/// browser's. Browsers older than every edition fall back to `esnext`.
fn edition_for(engine: Engine, version: EngineVersion) -> &'static str {
    let missing = unsupported_features(engine, version).len();
    EDITION_BUDGETS
        .iter()
        .find(|(_, budget)| missing <= *budget)
        .map(|(name, _)| *name)
        .unwrap_or("esnext")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_120: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.6099.109 Safari/537.36";
    const CHROME_61: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/61.0.3163.100 Safari/537.36";
    const CHROME_80: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.0 Safari/537.36";
    const FIREFOX_60: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:60.0) Gecko/20100101 Firefox/60.0";
    const SAFARI_10: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12) AppleWebKit/602.1.50 (KHTML, like Gecko) Version/10.0 Safari/602.1.50";
    const SAFARI_12: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/12.1 Safari/605.1.15";
    const IPHONE_15: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";
    const EDGE_18: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/70.0.3538.102 Safari/537.36 Edge/18.19045";
    const OPERA_100: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36 OPR/100.0.0.0";

    #[test]
    fn edition_budgets_match_table() {
        let budgets: Vec<_> = EDITION_BUDGETS.iter().map(|(_, n)| *n).collect();
        assert_eq!(budgets, vec![6, 19, 20, 26, 27, 34, 35, 37]);
    }

    #[test]
    fn explicit_known_target_wins() {
        let negotiated = negotiate(Some("es2019"), Some(CHROME_120));
        assert_eq!(negotiated.target, "es2019");
        assert!(!negotiated.from_user_agent);
    }

    #[test]
    fn unknown_explicit_target_falls_back_to_ua() {
        let negotiated = negotiate(Some("es1999"), Some(CHROME_120));
        assert_eq!(negotiated.target, "es2022");
        assert!(negotiated.from_user_agent);
    }

    #[test]
    fn missing_or_curl_agent_is_esnext() {
        assert_eq!(target_from_user_agent(None), "esnext");
        assert_eq!(target_from_user_agent(Some("")), "esnext");
        assert_eq!(target_from_user_agent(Some("curl/8.4.0")), "esnext");
    }

    #[test]
    fn deno_versions_split_at_1_33_1() {
        assert_eq!(target_from_user_agent(Some("Deno/1.33.1")), "deno");
        assert_eq!(target_from_user_agent(Some("Deno/1.20.0")), "deno");
        assert_eq!(target_from_user_agent(Some("Deno/1.33.2")), "denonext");
        assert_eq!(target_from_user_agent(Some("Deno/2.0.0")), "denonext");
        assert_eq!(target_from_user_agent(Some("Deno/nightly")), "denonext");
    }

    #[test]
    fn server_runtimes_are_node() {
        assert_eq!(target_from_user_agent(Some("undici")), "node");
        assert_eq!(target_from_user_agent(Some("Node/20.10.0")), "node");
        assert_eq!(target_from_user_agent(Some("Node.js/18")), "node");
        assert_eq!(target_from_user_agent(Some("Bun/1.0.0")), "node");
    }

    #[test]
    fn es_year_agents_pick_that_edition() {
        assert_eq!(target_from_user_agent(Some("ES/2020")), "es2020");
        assert_eq!(target_from_user_agent(Some("ES/1999")), "esnext");
    }

    #[test]
    fn browsers_are_scored_against_editions() {
        assert_eq!(target_from_user_agent(Some(CHROME_120)), "es2022");
        assert_eq!(target_from_user_agent(Some(CHROME_80)), "es2021");
        assert_eq!(target_from_user_agent(Some(CHROME_61)), "es2017");
        assert_eq!(target_from_user_agent(Some(FIREFOX_60)), "es2017");
        assert_eq!(target_from_user_agent(Some(SAFARI_12)), "es2017");
        assert_eq!(target_from_user_agent(Some(IPHONE_15)), "es2021");
        assert_eq!(target_from_user_agent(Some(EDGE_18)), "es2017");
        assert_eq!(target_from_user_agent(Some(OPERA_100)), "es2021");
    }

    #[test]
    fn browsers_older_than_es2015_get_esnext() {
        assert_eq!(target_from_user_agent(Some(SAFARI_10)), "esnext");
    }

    #[test]
    fn unrecognised_agents_get_esnext() {
        assert_eq!(target_from_user_agent(Some("Wget/1.21")), "esnext");
    }

    #[test]
    fn known_target_is_exact() {
        assert!(is_known_target("denonext"));
        assert!(!is_known_target("ES2022"));
        assert!(!is_known_target(""));
    }
}
