//! Source registry
//!
//! Holds every configured source, routes URLs to the source that handles them
//! and fans searches out over all searchable sources.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::types::{NovelHit, SourceHit, SourceLink};

use super::{FetchProgress, SelectorSource, SourceAdapter, SourceError};

/// Maximum number of sources searched at the same time
const SEARCH_CONCURRENCY: usize = 8;

/// One source's answer to a search
type SourceSearch = (Arc<dyn SourceAdapter>, Result<Vec<SourceHit>, SourceError>);

/// All sources known to the process
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { sources }
    }

    /// Build selector-driven sources from `[[sources]]` config tables
    pub fn from_config(configs: &[SourceConfig]) -> Result<Self, SourceError> {
        let mut sources: Vec<Arc<dyn SourceAdapter>> = Vec::with_capacity(configs.len());
        for config in configs {
            let source = SelectorSource::new(config.clone())?;
            info!(
                "Registered source {} ({} base URLs, search: {})",
                source.name(),
                source.base_urls().len(),
                source.can_search()
            );
            sources.push(Arc::new(source));
        }
        Ok(Self::new(sources))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Number of sources a search fans out to
    pub fn searchable_count(&self) -> usize {
        self.sources.iter().filter(|s| s.can_search()).count()
    }

    /// Find the source responsible for `url`
    pub fn adapter_for(&self, url: &str) -> Result<Arc<dyn SourceAdapter>, SourceError> {
        self.sources
            .iter()
            .find(|s| s.handles(url))
            .cloned()
            .ok_or_else(|| SourceError::Unsupported(url.to_string()))
    }

    /// Search every searchable source and group the hits by novel title.
    ///
    /// `progress` is advanced once per source, whether it succeeded or not.
    /// A failing source is skipped; the search only fails when every source
    /// failed.
    pub async fn search(
        &self,
        query: &str,
        progress: &FetchProgress,
    ) -> Result<Vec<NovelHit>, SourceError> {
        let searchable: Vec<_> = self
            .sources
            .iter()
            .filter(|s| s.can_search())
            .cloned()
            .collect();
        let total = searchable.len();

        let searches: Vec<BoxFuture<'_, SourceSearch>> = searchable
            .into_iter()
            .map(|source| {
                async move {
                    let result = source.search(query).await;
                    progress.advance();
                    (source, result)
                }
                .boxed()
            })
            .collect();
        let results: Vec<SourceSearch> = stream::iter(searches)
            .buffered(SEARCH_CONCURRENCY)
            .collect()
            .await;

        let mut failures = 0usize;
        let mut grouped: Vec<(String, NovelHit)> = Vec::new();

        for (source, result) in results {
            let hits = match result {
                Ok(hits) => hits,
                Err(e) => {
                    warn!("Search on {} failed: {}", source.name(), e);
                    failures += 1;
                    continue;
                }
            };
            debug!("{} returned {} hits for '{}'", source.name(), hits.len(), query);

            for hit in hits {
                let key = normalize_title(&hit.title);
                let link = SourceLink {
                    url: hit.url,
                    info: hit.info,
                };
                match grouped.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, novel)) => {
                        if !novel.sources.iter().any(|s| s.url == link.url) {
                            novel.sources.push(link);
                        }
                    }
                    None => grouped.push((
                        key,
                        NovelHit {
                            title: hit.title,
                            sources: vec![link],
                        },
                    )),
                }
            }
        }

        if total > 0 && failures == total {
            return Err(SourceError::AllSourcesFailed(total));
        }

        Ok(grouped.into_iter().map(|(_, novel)| novel).collect())
    }
}

/// Case and whitespace insensitive title key
fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
