//! Chapter and image download pass

use std::collections::BTreeSet;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::daemon::metrics::JobMetrics;
use crate::library::{image_file_name, LibraryError, SourceDir, StoredChapter};
use crate::source::{FetchPhase, FetchProgress, SourceAdapter, SourceError};
use crate::types::{ChapterRef, NovelMetadata};

/// Why a download pass failed
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("chapter {id} ({url}): {source}")]
    Chapter {
        id: u32,
        url: String,
        #[source]
        source: SourceError,
    },
    #[error(transparent)]
    Library(#[from] LibraryError),
}

/// Result of a completed pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub chapters_fetched: usize,
    pub chapters_skipped: usize,
    pub images_fetched: usize,
    pub images_failed: usize,
    /// Cover file name, relative to the source folder
    pub cover: Option<String>,
}

/// Everything a download pass needs
pub struct DownloadPass<'a> {
    pub adapter: &'a dyn SourceAdapter,
    pub novel: &'a NovelMetadata,
    pub dir: &'a SourceDir,
    pub progress: &'a FetchProgress,
    pub metrics: &'a JobMetrics,
    pub workers: usize,
}

impl DownloadPass<'_> {
    /// Fetch every chapter that has no stored file, then the cover if it is
    /// missing, then every image of a stored chapter that is not on disk yet.
    ///
    /// A chapter failure fails the pass. Image failures are logged and
    /// skipped; the next pass retries them.
    pub async fn run(&self) -> Result<DownloadOutcome, DownloadError> {
        let mut outcome = DownloadOutcome::default();

        let pending: Vec<&ChapterRef> = self
            .novel
            .chapters
            .iter()
            .filter(|c| !self.dir.has_chapter(c.id))
            .collect();
        outcome.chapters_skipped = self.novel.chapters.len() - pending.len();

        self.progress.reset();
        self.progress.set_phase(Some(FetchPhase::Chapters));
        self.progress.set_chapters_total(pending.len() as u64);
        info!(
            "Downloading {} chapters of '{}' ({} already stored)",
            pending.len(),
            self.novel.title,
            outcome.chapters_skipped
        );

        let chapter_tasks: Vec<BoxFuture<'_, Result<(), DownloadError>>> = pending
            .into_iter()
            .map(|chapter| self.fetch_chapter(chapter).boxed())
            .collect();
        let fetched: Vec<()> = stream::iter(chapter_tasks)
            .buffer_unordered(self.workers.max(1))
            .try_collect()
            .await?;
        outcome.chapters_fetched = fetched.len();

        // Images: +1 for the cover
        let missing = self.missing_images();
        self.progress.reset();
        self.progress.set_phase(Some(FetchPhase::Images));
        self.progress.set_images_total(missing.len() as u64 + 1);

        outcome.cover = self.fetch_cover().await;

        let image_tasks: Vec<BoxFuture<'_, bool>> = missing
            .iter()
            .map(|url| self.fetch_image(url).boxed())
            .collect();
        let stored: Vec<bool> = stream::iter(image_tasks)
            .buffer_unordered(self.workers.max(1))
            .collect()
            .await;
        outcome.images_fetched = stored.iter().filter(|ok| **ok).count();
        outcome.images_failed = stored.len() - outcome.images_fetched;

        self.progress.set_phase(None);
        info!(
            "Download of '{}' done: {} chapters, {} images ({} failed)",
            self.novel.title, outcome.chapters_fetched, outcome.images_fetched, outcome.images_failed
        );
        Ok(outcome)
    }

    /// Image URLs referenced by stored chapters whose file is absent
    fn missing_images(&self) -> BTreeSet<String> {
        let mut missing = BTreeSet::new();
        for chapter in &self.novel.chapters {
            if !self.dir.has_chapter(chapter.id) {
                continue;
            }
            match self.dir.read_chapter(chapter.id) {
                Ok(stored) => missing.extend(
                    stored
                        .images
                        .into_iter()
                        .filter(|(_, name)| !self.dir.has_image(name))
                        .map(|(url, _)| url),
                ),
                Err(e) => warn!("Cannot read chapter {} for images: {}", chapter.id, e),
            }
        }
        missing
    }

    async fn fetch_chapter(&self, chapter: &ChapterRef) -> Result<(), DownloadError> {
        let content = self
            .adapter
            .fetch_chapter(chapter)
            .await
            .map_err(|source| DownloadError::Chapter {
                id: chapter.id,
                url: chapter.url.clone(),
                source,
            })?;

        let stored = StoredChapter {
            id: chapter.id,
            title: chapter.title.clone(),
            url: chapter.url.clone(),
            body: content.body,
            images: content
                .images
                .into_iter()
                .map(|url| {
                    let name = image_file_name(&url);
                    (url, name)
                })
                .collect(),
        };
        self.dir.write_chapter(&stored)?;

        self.progress.advance();
        self.metrics.chapters_fetched.inc();
        debug!("Stored chapter {} of '{}'", chapter.id, self.novel.title);
        Ok(())
    }

    async fn fetch_cover(&self) -> Option<String> {
        let result = match (self.dir.stored_cover(), &self.novel.cover_url) {
            (Some(existing), _) => {
                debug!("Keeping stored cover of '{}'", self.novel.title);
                Some(existing)
            }
            (None, Some(url)) => match self.adapter.fetch_image(url).await {
                Ok(bytes) => match self.dir.write_cover(url, &bytes) {
                    Ok(name) => Some(name),
                    Err(e) => {
                        warn!("Failed to store cover of '{}': {}", self.novel.title, e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Failed to fetch cover {}: {}", url, e);
                    None
                }
            },
            (None, None) => None,
        };
        self.progress.advance();
        result
    }

    async fn fetch_image(&self, url: &str) -> bool {
        let stored = match self.adapter.fetch_image(url).await {
            Ok(bytes) => self
                .dir
                .write_image(url, &bytes)
                .map_err(|e| warn!("Failed to store image {}: {}", url, e))
                .is_ok(),
            Err(e) => {
                warn!("Failed to fetch image {}: {}", url, e);
                false
            }
        };
        self.progress.advance();
        if stored {
            self.metrics.images_fetched.inc();
        } else {
            self.metrics.images_failed.inc();
        }
        stored
    }
}
