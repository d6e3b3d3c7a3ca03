use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use weaver_staging::OPENSEARCH_LOCAL_FILE_SCHEME;

/// One entry of the `data_sources` configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceEntry {
    pub netloc: String,
    pub ades: String,
    pub rootdir: Option<String>,
    #[serde(default)]
    pub default: bool,
}

/// The configured `source_name -> {netloc, ades, rootdir?, default?}` map.
/// Backed by an `IndexMap` so the fallback-default rule ("first in
/// insertion order when none is marked `default: true`") is exact.
#[derive(Debug, Clone, Default)]
pub struct DataSources {
    sources: IndexMap<String, SourceEntry>,
}

impl DataSources {
    pub fn new(sources: IndexMap<String, SourceEntry>) -> Self {
        Self { sources }
    }

    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let sources: IndexMap<String, SourceEntry> = serde_json::from_str(body)?;
        Ok(Self::new(sources))
    }

    /// The default source: the first entry with `default: true`, else the
    /// first entry in insertion order.
    pub fn default_source(&self) -> Option<&str> {
        self.sources
            .iter()
            .find(|(_, e)| e.default)
            .or_else(|| self.sources.iter().next())
            .map(|(name, _)| name.as_str())
    }

    /// Resolves an input URL to a configured source name: scheme+host match
    /// against `netloc` first, then (for the opensearch local-file scheme)
    /// the longest `rootdir` prefix of the path, then the configured default.
    pub fn resolve_by_url(&self, url: &str) -> Option<&str> {
        let parsed = Url::parse(url).ok()?;

        if parsed.scheme() == OPENSEARCH_LOCAL_FILE_SCHEME {
            return self.resolve_by_rootdir(parsed.path());
        }

        let netloc = match parsed.port() {
            Some(port) => format!("{}:{}", parsed.host_str().unwrap_or(""), port),
            None => parsed.host_str().unwrap_or("").to_string(),
        };
        if let Some((name, _)) = self.sources.iter().find(|(_, e)| e.netloc == netloc) {
            return Some(name.as_str());
        }

        self.default_source()
    }

    fn resolve_by_rootdir(&self, path: &str) -> Option<&str> {
        self.sources
            .iter()
            .filter_map(|(name, e)| e.rootdir.as_ref().map(|r| (name, r)))
            .filter(|(_, rootdir)| path.starts_with(rootdir.as_str()))
            .max_by_key(|(_, rootdir)| rootdir.len())
            .map(|(name, _)| name.as_str())
            .or_else(|| self.default_source())
    }

    /// Resolves a source name to its configured ADES URL; `None` resolves to
    /// this process's own API-Processes base URL.
    pub fn resolve_to_ades<'a>(&'a self, source_name: Option<&str>, local_base: &'a str) -> &'a str {
        match source_name.and_then(|name| self.sources.get(name)) {
            Some(entry) => &entry.ades,
            None => local_base,
        }
    }
}
