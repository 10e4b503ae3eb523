//! Configuration for shelfd

mod http;
mod jobs;
mod logging;
mod sources;

pub use http::HttpConfig;
pub use jobs::{JobsConfig, LibraryConfig};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use sources::SourceConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use url::Url;

/// Default user agent for all source requests
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) shelfd/0.1 (+https://github.com/shelfd)";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "shelfd.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Novel storage
    #[serde(default)]
    pub library: LibraryConfig,
    /// Job orchestration
    #[serde(default)]
    pub jobs: JobsConfig,
    /// HTTP API server
    #[serde(default)]
    pub http: HttpConfig,
    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Selector-driven sources
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config = Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Library
        if self.library.root.as_os_str().is_empty() {
            errors.push("library root must not be empty".to_string());
        }

        // Jobs
        if self.jobs.workers == 0 {
            errors.push("jobs.workers must be positive".to_string());
        }
        if self.jobs.min_query_len == 0 {
            errors.push("jobs.min_query_len must be positive".to_string());
        }

        // HTTP
        if let Err(e) = self.http.listen_addr.parse::<SocketAddr>() {
            errors.push(format!(
                "http.listen_addr '{}' is not a valid socket address: {}",
                self.http.listen_addr, e
            ));
        }
        if self.http.api_keys.iter().any(|k| k.trim().is_empty()) {
            errors.push("http.api_keys must not contain empty keys".to_string());
        }

        // Sources
        let mut names = HashSet::new();
        for (i, source) in self.sources.iter().enumerate() {
            let label = if source.name.is_empty() {
                format!("sources[{}]", i)
            } else {
                format!("source '{}'", source.name)
            };
            validate_source(&label, source, &mut errors);
            if !source.name.is_empty() && !names.insert(source.name.as_str()) {
                errors.push(format!("{}: duplicate source name", label));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

fn validate_source(label: &str, source: &SourceConfig, errors: &mut Vec<String>) {
    if source.name.is_empty() {
        errors.push(format!("{}: name must not be empty", label));
    }
    if source.base_urls.is_empty() {
        errors.push(format!("{}: at least one base URL is required", label));
    }
    for base in &source.base_urls {
        match Url::parse(base) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => errors.push(format!("{}: base URL '{}' is not an http(s) URL", label, base)),
        }
    }
    if let Some(search_url) = &source.search_url {
        if !search_url.contains("{query}") {
            errors.push(format!("{}: search_url must contain {{query}}", label));
        }
        if source.search_item.is_none() {
            errors.push(format!("{}: search_url requires search_item", label));
        }
    }
    if source.request_timeout_secs == 0 {
        errors.push(format!("{}: request_timeout_secs must be positive", label));
    }

    let selectors = [
        Some(source.novel_title.as_str()),
        Some(source.chapter_link.as_str()),
        Some(source.chapter_body.as_str()),
        source.search_item.as_deref(),
        source.search_info.as_deref(),
        source.novel_author.as_deref(),
        source.novel_cover.as_deref(),
    ];
    for selector in selectors.into_iter().flatten() {
        if scraper::Selector::parse(selector).is_err() {
            errors.push(format!("{}: invalid CSS selector '{}'", label, selector));
        }
    }
}

/// Commented default configuration written by `shelfd init`
pub fn default_config_toml() -> String {
    let config = Config::default();
    format!(
        r##"# shelfd configuration

[library]
root = "{}"

[jobs]
workers = {}
min_query_len = {}
min_chapter_body_len = {}
update_cooldown_secs = {}

[http]
listen_addr = "{}"
api_keys = []
cors_enabled = {}

[logging]
format = "text"
level = "{}"

# Sources are described with CSS selectors. Example:
#
# [[sources]]
# name = "example"
# base_urls = ["https://novels.example/"]
# search_url = "https://novels.example/search?q={{query}}"
# search_item = ".search-results a.novel"
# novel_title = "h1.title"
# novel_author = ".author"
# novel_cover = ".cover img"
# chapter_link = "ul.chapter-list a"
# chapter_body = "#chapter-content"
"##,
        config.library.root.display(),
        config.jobs.workers,
        config.jobs.min_query_len,
        config.jobs.min_chapter_body_len,
        config.jobs.update_cooldown_secs,
        config.http.listen_addr,
        config.http.cors_enabled,
        config.logging.level,
    )
}
