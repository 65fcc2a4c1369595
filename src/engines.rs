//! Search engine table
//!
//! A fixed, immutable set of search engines the `/search` endpoint can
//! target. Loaded once at startup; unknown engine keys fall back to the
//! default.

use serde::Serialize;

use crate::resolver;

/// One supported search engine
#[derive(Debug, Clone, Serialize)]
pub struct SearchEngine {
    pub key: &'static str,
    pub name: &'static str,
    pub origin: &'static str,
    #[serde(skip)]
    query_prefix: &'static str,
}

impl SearchEngine {
    /// Build the engine's result URL for a query string
    pub fn query_url(&self, query: &str) -> String {
        format!("{}{}", self.query_prefix, resolver::encode_target(query))
    }
}

const DEFAULT_ENGINE: &str = "google";

const ENGINES: &[SearchEngine] = &[
    SearchEngine {
        key: "google",
        name: "Google",
        origin: "https://www.google.com",
        query_prefix: "https://www.google.com/search?q=",
    },
    SearchEngine {
        key: "duckduckgo",
        name: "DuckDuckGo",
        origin: "https://duckduckgo.com",
        query_prefix: "https://duckduckgo.com/?q=",
    },
    SearchEngine {
        key: "bing",
        name: "Bing",
        origin: "https://www.bing.com",
        query_prefix: "https://www.bing.com/search?q=",
    },
    SearchEngine {
        key: "yahoo",
        name: "Yahoo",
        origin: "https://search.yahoo.com",
        query_prefix: "https://search.yahoo.com/search?p=",
    },
    SearchEngine {
        key: "brave",
        name: "Brave",
        origin: "https://search.brave.com",
        query_prefix: "https://search.brave.com/search?q=",
    },
    SearchEngine {
        key: "ecosia",
        name: "Ecosia",
        origin: "https://www.ecosia.org",
        query_prefix: "https://www.ecosia.org/search?q=",
    },
];

/// Immutable engine lookup table
#[derive(Debug, Default)]
pub struct EngineTable;

impl EngineTable {
    pub fn new() -> Self {
        Self
    }

    /// Look up an engine by key (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&'static SearchEngine> {
        ENGINES.iter().find(|e| e.key.eq_ignore_ascii_case(key))
    }

    pub fn default_engine(&self) -> &'static SearchEngine {
        self.get(DEFAULT_ENGINE)
            .unwrap_or(&ENGINES[0])
    }

    /// Resolve an optional engine key, falling back to the default for
    /// missing or unrecognized keys
    pub fn select(&self, key: Option<&str>) -> &'static SearchEngine {
        key.and_then(|k| self.get(k))
            .unwrap_or_else(|| self.default_engine())
    }

    pub fn all(&self) -> &'static [SearchEngine] {
        ENGINES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = EngineTable::new();
        assert_eq!(table.get("duckduckgo").unwrap().name, "DuckDuckGo");
        assert_eq!(table.get("DuckDuckGo").unwrap().name, "DuckDuckGo");
        assert!(table.get("altavista").is_none());
    }

    #[test]
    fn test_unknown_engine_falls_back_to_default() {
        let table = EngineTable::new();
        assert_eq!(table.select(Some("altavista")).key, "google");
        assert_eq!(table.select(None).key, "google");
        assert_eq!(table.select(Some("brave")).key, "brave");
    }

    #[test]
    fn test_query_url_encodes_the_query() {
        let table = EngineTable::new();
        let url = table.get("google").unwrap().query_url("rust async & await");
        assert_eq!(
            url,
            "https://www.google.com/search?q=rust%20async%20%26%20await"
        );

        let url = table.get("yahoo").unwrap().query_url("cats");
        assert_eq!(url, "https://search.yahoo.com/search?p=cats");
    }

    #[test]
    fn test_every_engine_origin_is_a_valid_target() {
        let table = EngineTable::new();
        for engine in table.all() {
            let target = crate::resolver::resolve(engine.origin).unwrap();
            assert_eq!(target.url().scheme(), "https", "{}", engine.key);
        }
    }
}
