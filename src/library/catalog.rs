//! In-memory catalog of stored novels

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};

use super::{Library, LibraryError, NovelMeta};

/// One source folder of a catalogued novel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSource {
    pub slug: String,
    pub url: String,
    pub chapters: usize,
    pub last_update_date: Option<DateTime<Utc>>,
}

/// A novel known to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub title: String,
    pub author: String,
    pub sources: Vec<CatalogSource>,
}

/// Novel slug -> catalog entry
#[derive(Debug, Default)]
pub struct Catalog {
    novels: DashMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the catalog from every `meta.json` in the library.
    ///
    /// Unreadable metadata is logged and skipped.
    pub fn scan(library: &Library) -> Result<Self, LibraryError> {
        let catalog = Self::new();
        let mut skipped = 0usize;

        for (novel_slug, dir) in library.stored_sources()? {
            match dir.read_meta() {
                Ok(meta) => catalog.register(&novel_slug, &meta),
                Err(e) => {
                    warn!("Skipping {}: {}", dir.meta_path().display(), e);
                    skipped += 1;
                }
            }
        }

        info!(
            "Catalog loaded: {} novels from {} ({} skipped)",
            catalog.len(),
            library.root().display(),
            skipped
        );
        Ok(catalog)
    }

    /// Add or refresh one source folder of a novel
    pub fn register(&self, novel_slug: &str, meta: &NovelMeta) {
        let source = CatalogSource {
            slug: meta.source.clone(),
            url: meta.url.clone(),
            chapters: meta.chapters.len(),
            last_update_date: meta.last_update_date,
        };

        let mut entry = self
            .novels
            .entry(novel_slug.to_string())
            .or_insert_with(|| CatalogEntry {
                title: meta.title.clone(),
                author: meta.author.clone(),
                sources: Vec::new(),
            });

        if entry.author.is_empty() && !meta.author.is_empty() {
            entry.author = meta.author.clone();
        }
        match entry.sources.iter_mut().find(|s| s.slug == source.slug) {
            Some(existing) => *existing = source,
            None => entry.sources.push(source),
        }
    }

    pub fn get(&self, novel_slug: &str) -> Option<CatalogEntry> {
        self.novels.get(novel_slug).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.novels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.novels.is_empty()
    }
}
