//! Pinned reverse-proxy mounts
//!
//! Each mount binds a path prefix to one fixed upstream origin and
//! forwards the path suffix with no content rewriting. The table is
//! built once at startup from the built-in aliases plus one mount per
//! search engine; per-site quirks are configuration data here, not
//! separate code paths.

use std::sync::Arc;

use url::Url;

use crate::engines::EngineTable;
use crate::error::{PosternError, Result};
use crate::resolver;

/// One fixed-origin mount
#[derive(Debug, Clone)]
pub struct PinnedMount {
    pub prefix: String,
    pub origin: Url,
}

impl PinnedMount {
    /// Resolve the forwarded target: mount origin + stripped path suffix
    /// (+ client query, when present)
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Result<Url> {
        let mut url = self
            .origin
            .join(path)
            .map_err(|e| PosternError::InvalidRequest(format!("mount path {}: {}", path, e)))?;
        url.set_query(query);
        Ok(url)
    }
}

/// Immutable prefix → origin table, read-only after startup
#[derive(Debug, Default)]
pub struct MountTable {
    mounts: Vec<Arc<PinnedMount>>,
}

impl MountTable {
    /// Build the standard table: `/gh`, `/yt`, and `/search/{key}` for
    /// every known engine
    pub fn new(engines: &EngineTable) -> Result<Self> {
        let mut table = Self::default();

        table.insert("/gh", "https://github.com")?;
        table.insert("/yt", "https://www.youtube.com")?;

        for engine in engines.all() {
            table.insert(&format!("/search/{}", engine.key), engine.origin)?;
        }

        Ok(table)
    }

    /// Add a mount; the origin is validated through the resolver so only
    /// http(s) targets can ever be pinned.
    pub fn insert(&mut self, prefix: &str, origin: &str) -> Result<()> {
        if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
            return Err(PosternError::InvalidConfig(format!(
                "mount prefix must be /name-shaped: {}",
                prefix
            )));
        }

        let origin = resolver::resolve(origin)?.into_url();

        self.mounts.push(Arc::new(PinnedMount {
            prefix: prefix.to_string(),
            origin,
        }));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PinnedMount>> {
        self.mounts.iter()
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_contains_aliases_and_engines() {
        let engines = EngineTable::new();
        let table = MountTable::new(&engines).unwrap();

        let prefixes: Vec<&str> = table.iter().map(|m| m.prefix.as_str()).collect();
        assert!(prefixes.contains(&"/gh"));
        assert!(prefixes.contains(&"/yt"));
        assert!(prefixes.contains(&"/search/google"));
        assert!(prefixes.contains(&"/search/duckduckgo"));
        assert_eq!(table.len(), 2 + engines.all().len());
    }

    #[test]
    fn test_target_url_joins_suffix_and_query() {
        let engines = EngineTable::new();
        let table = MountTable::new(&engines).unwrap();
        let gh = table.iter().find(|m| m.prefix == "/gh").unwrap();

        let url = gh.target_url("/rust-lang/rust", None).unwrap();
        assert_eq!(url.as_str(), "https://github.com/rust-lang/rust");

        let url = gh.target_url("/search", Some("q=tokio&type=code")).unwrap();
        assert_eq!(url.as_str(), "https://github.com/search?q=tokio&type=code");

        let url = gh.target_url("/", None).unwrap();
        assert_eq!(url.as_str(), "https://github.com/");
    }

    #[test]
    fn test_insert_rejects_bad_prefixes_and_origins() {
        let mut table = MountTable::default();
        assert!(table.insert("gh", "https://github.com").is_err());
        assert!(table.insert("/gh/", "https://github.com").is_err());
        assert!(table.insert("/", "https://github.com").is_err());
        assert!(table.insert("/ftp", "ftp://files.example.com").is_err());
        assert!(table.is_empty());

        table.insert("/ok", "https://example.com").unwrap();
        assert_eq!(table.len(), 1);
    }
}
