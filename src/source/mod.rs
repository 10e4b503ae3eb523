//! Content sources
//!
//! A source knows how to search one external site, read a novel's metadata and
//! chapter list, and fetch chapter bodies and images. The job state machine
//! only ever talks to sources through [`SourceAdapter`].

pub mod progress;
mod registry;
mod selector;

pub use progress::{FetchPhase, FetchProgress};
pub use registry::SourceRegistry;
pub use selector::SelectorSource;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::types::{ChapterContent, ChapterRef, NovelMetadata, SourceHit};

/// Errors raised by content sources
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("No source can handle {0}")]
    Unsupported(String),
    #[error("Source {0} does not support search")]
    SearchUnsupported(String),
    #[error("Search failed on all {0} sources")]
    AllSourcesFailed(usize),
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("Failed to parse {url}: {reason}")]
    Parse { url: String, reason: String },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// One external site that novels can be fetched from
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Human readable name, used in logs
    fn name(&self) -> &str;

    /// URL prefixes this source is responsible for
    fn base_urls(&self) -> &[String];

    /// Whether [`SourceAdapter::search`] is supported
    fn can_search(&self) -> bool;

    /// Search the source for novels matching `query`
    async fn search(&self, query: &str) -> Result<Vec<SourceHit>, SourceError>;

    /// Read novel information and the full chapter list from a novel page
    async fn fetch_novel(&self, url: &str) -> Result<NovelMetadata, SourceError>;

    /// Fetch the body of one chapter
    async fn fetch_chapter(&self, chapter: &ChapterRef) -> Result<ChapterContent, SourceError>;

    /// Fetch raw image bytes
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, SourceError>;

    /// Whether this source handles `url`
    fn handles(&self, url: &str) -> bool {
        self.base_urls().iter().any(|base| url_under_base(url, base))
    }
}

/// Same scheme, host and port as `base`, with a path below the base path
fn url_under_base(url: &str, base: &str) -> bool {
    let (Ok(url), Ok(base)) = (Url::parse(url), Url::parse(base)) else {
        return false;
    };
    if url.scheme() != base.scheme()
        || url.host_str() != base.host_str()
        || url.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }
    let prefix = base.path().trim_end_matches('/');
    match url.path().strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_under_base() {
        assert!(url_under_base("https://novels.example/novel/lom", "https://novels.example/"));
        assert!(url_under_base("https://novels.example", "https://novels.example/"));
        assert!(url_under_base("https://novels.example:443/x", "https://novels.example"));
        assert!(url_under_base("https://a.example/read/1", "https://a.example/read/"));
    }

    #[test]
    fn test_sibling_hosts_are_not_handled() {
        let base = "https://novels.example";
        assert!(!url_under_base("https://novels.example.evil.org/x", base));
        assert!(!url_under_base("https://novels.examples/x", base));
        assert!(!url_under_base("http://novels.example/x", base));
        assert!(!url_under_base("https://novels.example:8443/x", base));
        assert!(!url_under_base("https://a.example/reader/1", "https://a.example/read"));
        assert!(!url_under_base("not a url", base));
    }
}
