//! Selector-driven source definitions

use serde::{Deserialize, Serialize};

use super::DEFAULT_USER_AGENT;

/// One `[[sources]]` table
///
/// Each selector is a CSS selector evaluated against the fetched page.
/// `search_url` may contain a `{query}` placeholder which is replaced with the
/// url-encoded search text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name used in logs
    pub name: String,
    /// URL prefixes handled by this source
    pub base_urls: Vec<String>,
    /// Search page template, e.g. "https://site/search?q={query}"
    #[serde(default)]
    pub search_url: Option<String>,
    /// Links to novels on the search page
    #[serde(default)]
    pub search_item: Option<String>,
    /// Extra information inside a search item
    #[serde(default)]
    pub search_info: Option<String>,
    /// Novel title on the novel page
    pub novel_title: String,
    #[serde(default)]
    pub novel_author: Option<String>,
    /// Cover `<img>` on the novel page
    #[serde(default)]
    pub novel_cover: Option<String>,
    /// Chapter links on the novel page, in reading order
    pub chapter_link: String,
    /// Content container on a chapter page
    pub chapter_body: String,
    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_urls: Vec::new(),
            search_url: None,
            search_item: None,
            search_info: None,
            novel_title: String::new(),
            novel_author: None,
            novel_cover: None,
            chapter_link: String::new(),
            chapter_body: String::new(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}
