use once_cell::sync::Lazy;
use regex::Regex;

use super::compat::{Engine, EngineVersion};

// Order matters: Edge and Opera also advertise `Chrome/`, and Chrome
// advertises `Safari/`.
static BROWSERS: Lazy<Vec<(Regex, Engine)>> = Lazy::new(|| {
    [
        (r"\bEdg(?:e|A|iOS)?/(\d+(?:\.\d+)*)", Engine::Edge),
        (r"\bOPR/(\d+(?:\.\d+)*)", Engine::Opera),
        (r"^Opera/.*\bVersion/(\d+(?:\.\d+)*)", Engine::Opera),
        (r"\bFirefox/(\d+(?:\.\d+)*)", Engine::Firefox),
        (
            r"\b(?:HeadlessChrome|Chrome|Chromium|CriOS)/(\d+(?:\.\d+)*)",
            Engine::Chrome,
        ),
        (r"\bVersion/(\d+(?:\.\d+)*)(?:.*)\bSafari/", Engine::Safari),
    ]
    .into_iter()
    .filter_map(|(pattern, engine)| Regex::new(pattern).ok().map(|re| (re, engine)))
    .collect()
});

/// Identifies the browser engine and version a `User-Agent` belongs to.
///
/// Safari on iPhone, iPad and iPod is reported as iOS, whose feature support
/// follows the OS release rather than the desktop Safari line.
pub fn detect_browser(user_agent: &str) -> Option<(Engine, EngineVersion)> {
    let (engine, version) = BROWSERS.iter().find_map(|(re, engine)| {
        re.captures(user_agent)
            .and_then(|caps| caps.get(1))
            .map(|m| (*engine, m.as_str()))
    })?;
    let engine = match engine {
        Engine::Safari if is_ios_device(user_agent) => Engine::Ios,
        other => other,
    };
    Some((engine, parse_version(version)?))
}

fn is_ios_device(user_agent: &str) -> bool {
    ["iPhone", "iPad", "iPod"]
        .iter()
        .any(|device| user_agent.contains(device))
}

/// Parses up to three dotted numeric components, padding missing ones with 0.
pub fn parse_version(raw: &str) -> Option<EngineVersion> {
    let mut version = [0u32; 3];
    for (slot, part) in version.iter_mut().zip(raw.split('.')) {
        *slot = part.parse().ok()?;
    }
    Some(version)
}
