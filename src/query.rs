//! Ordered query parameters with the normalisation rules shared by cache
//! keys, storage keys and origin URLs.

use url::form_urlencoded;

/// Query keys that influence a build. Everything else is dropped before a
/// request reaches a cache or the origin.
pub const ALLOWED_QUERY_KEYS: [&str; 27] = [
    "alias",
    "bundle",
    "bundle-all",
    "bundle-deps",
    "conditions",
    "css",
    "deno-std",
    "deps",
    "dev",
    "exports",
    "external",
    "ignore-annotations",
    "ignore-require",
    "importer",
    "jsx-runtime",
    "keep-names",
    "name",
    "no-bundle",
    "no-check",
    "no-dts",
    "path",
    "raw",
    "standalone",
    "target",
    "type",
    "v",
    "worker",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parses a raw query string, with or without the leading `?`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        Self {
            pairs: form_urlencoded::parse(raw.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces every value of `key` with a single `value`, keeping the
    /// position of the first occurrence.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(idx) => {
                self.pairs[idx].1 = value.to_string();
                let mut seen = 0usize;
                self.pairs.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    /// Merges `a=1&b=2` style parameters, overriding existing keys.
    pub fn merge_raw(&mut self, raw: &str) {
        for (key, value) in QueryParams::parse(raw).pairs {
            self.set(&key, &value);
        }
    }

    /// Drops unknown keys, lets `raw` win over `target`, then sorts by key.
    pub fn normalize(&mut self) {
        self.pairs
            .retain(|(k, _)| ALLOWED_QUERY_KEYS.contains(&k.as_str()));
        if self.has("raw") {
            self.remove("target");
        }
        // stable: repeated keys keep their relative order
        self.pairs.sort_by(|a, b| a.0.cmp(&b.0));
    }

    pub fn normalized(&self) -> Self {
        let mut copy = self.clone();
        copy.normalize();
        copy
    }

    /// Serialises without the leading `?`.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Serialises with a leading `?`, or to an empty string.
    pub fn to_search(&self) -> String {
        if self.pairs.is_empty() {
            String::new()
        } else {
            format!("?{}", self.encode())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_handles_leading_question_mark() {
        let query = QueryParams::parse("?dev&target=es2022");
        assert!(query.has("dev"));
        assert_eq!(query.get("dev"), Some(""));
        assert_eq!(query.get("target"), Some("es2022"));
        assert_eq!(QueryParams::parse(""), QueryParams::default());
    }

    #[test]
    fn set_collapses_duplicates() {
        let mut query = QueryParams::parse("a=1&b=2&a=3");
        query.set("a", "9");
        assert_eq!(query.encode(), "a=9&b=2");
        query.set("c", "");
        assert_eq!(query.encode(), "a=9&b=2&c=");
    }

    #[test]
    fn normalize_strips_unknown_keys_and_sorts() {
        let mut query = QueryParams::parse("target=es2020&utm_source=x&external=react&bundle");
        query.normalize();
        assert_eq!(query.encode(), "bundle=&external=react&target=es2020");
    }

    #[test]
    fn normalize_raw_wins_over_target() {
        let query = QueryParams::parse("target=es2022&raw").normalized();
        assert!(!query.has("target"));
        assert!(query.has("raw"));
    }

    #[test]
    fn normalize_is_order_independent() {
        let a = QueryParams::parse("dev&alias=a:b&external=x").normalized();
        let b = QueryParams::parse("external=x&dev&alias=a:b").normalized();
        assert_eq!(a.encode(), b.encode());
    }

    #[test]
    fn merge_raw_overrides() {
        let mut query = QueryParams::parse("dev=0");
        query.merge_raw("dev&bundle");
        assert_eq!(query.get("dev"), Some(""));
        assert!(query.has("bundle"));
    }

    #[test]
    fn to_search_prefixes_question_mark() {
        assert_eq!(QueryParams::default().to_search(), "");
        assert_eq!(QueryParams::parse("a=1").to_search(), "?a=1");
    }

    #[test]
    fn allow_list_is_sorted() {
        let mut sorted = ALLOWED_QUERY_KEYS;
        sorted.sort();
        assert_eq!(sorted, ALLOWED_QUERY_KEYS);
    }
}
