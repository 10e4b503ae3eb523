//! Shared helpers for integration tests: an in-memory source and a
//! JobManager rooted in a temp directory.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use shelfd::config::JobsConfig;
use shelfd::daemon::jobs::{DownloadStatus, JobManager, JobServices, Poll, UpdateStatus};
use shelfd::library::{Catalog, Library};
use shelfd::source::{SourceAdapter, SourceError, SourceRegistry};
use shelfd::types::{ChapterContent, ChapterRef, NovelMetadata, SearchResults, SourceHit};
use shelfd::util::slugify;
use tempfile::TempDir;

pub const CHAPTER_BODY_LEN: usize = 240;

struct FakeNovel {
    title: String,
    chapters: u32,
}

/// Source serving a fixed set of novels from memory
pub struct FakeSource {
    name: String,
    base: String,
    base_urls: Vec<String>,
    novels: Mutex<Vec<FakeNovel>>,
    fail_search: AtomicBool,
    fail_chapter: Mutex<Option<u32>>,
    fail_images: AtomicBool,
    delay: Duration,
    pub search_calls: AtomicUsize,
    pub novel_calls: AtomicUsize,
    pub chapter_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
}

impl FakeSource {
    /// Source for `https://<host>`
    pub fn new(host: &str) -> Self {
        let base = format!("https://{}", host);
        Self {
            name: host.to_string(),
            base_urls: vec![base.clone()],
            base,
            novels: Mutex::new(Vec::new()),
            fail_search: AtomicBool::new(false),
            fail_chapter: Mutex::new(None),
            fail_images: AtomicBool::new(false),
            delay: Duration::from_millis(5),
            search_calls: AtomicUsize::new(0),
            novel_calls: AtomicUsize::new(0),
            chapter_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_novel(self, title: &str, chapters: u32) -> Self {
        self.novels.lock().push(FakeNovel {
            title: title.to_string(),
            chapters,
        });
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_chapter(&self, id: Option<u32>) {
        *self.fail_chapter.lock() = id;
    }

    /// Make every image and cover fetch fail
    pub fn set_fail_images(&self, fail: bool) {
        self.fail_images.store(fail, Ordering::SeqCst);
    }

    pub fn set_chapters(&self, title: &str, chapters: u32) {
        if let Some(novel) = self.novels.lock().iter_mut().find(|n| n.title == title) {
            novel.chapters = chapters;
        }
    }

    pub fn novel_url(&self, title: &str) -> String {
        format!("{}/novel/{}", self.base, slugify(title))
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_urls(&self) -> &[String] {
        &self.base_urls
    }

    fn can_search(&self) -> bool {
        true
    }

    async fn search(&self, query: &str) -> Result<Vec<SourceHit>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(SourceError::Parse {
                url: self.base.clone(),
                reason: "search page unavailable".to_string(),
            });
        }

        let query = query.to_lowercase();
        let hits = self
            .novels
            .lock()
            .iter()
            .filter(|n| n.title.to_lowercase().contains(&query))
            .map(|n| SourceHit {
                title: n.title.clone(),
                url: self.novel_url(&n.title),
                info: format!("{} chapters", n.chapters),
            })
            .collect();
        Ok(hits)
    }

    async fn fetch_novel(&self, url: &str) -> Result<NovelMetadata, SourceError> {
        self.novel_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let found = self
            .novels
            .lock()
            .iter()
            .find(|n| self.novel_url(&n.title) == url)
            .map(|n| (n.title.clone(), n.chapters));
        let Some((title, chapters)) = found else {
            return Err(SourceError::Parse {
                url: url.to_string(),
                reason: "no such novel".to_string(),
            });
        };

        Ok(NovelMetadata {
            title,
            author: Some("Fake Author".to_string()),
            cover_url: Some(format!("{}/cover.jpg", self.base)),
            home_url: format!("{}/", self.base),
            novel_url: url.to_string(),
            chapters: (1..=chapters)
                .map(|id| ChapterRef {
                    id,
                    title: format!("Chapter {}", id),
                    url: format!("{}/{}", url, id),
                })
                .collect(),
        })
    }

    async fn fetch_chapter(&self, chapter: &ChapterRef) -> Result<ChapterContent, SourceError> {
        self.chapter_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if *self.fail_chapter.lock() == Some(chapter.id) {
            return Err(SourceError::Parse {
                url: chapter.url.clone(),
                reason: "chapter body missing".to_string(),
            });
        }

        let images = if chapter.id == 1 {
            vec![format!("{}/img/{}.png", self.base, chapter.id)]
        } else {
            Vec::new()
        };
        Ok(ChapterContent {
            body: "x".repeat(CHAPTER_BODY_LEN),
            images,
        })
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_images.load(Ordering::SeqCst) {
            return Err(SourceError::Parse {
                url: url.to_string(),
                reason: "image unavailable".to_string(),
            });
        }
        Ok(b"\x89PNG fake".to_vec())
    }
}

/// A JobManager over one fake source, with its library in a temp directory
pub struct Harness {
    pub temp: TempDir,
    pub source: Arc<FakeSource>,
    pub library: Library,
    pub manager: JobManager,
}

pub fn harness(source: FakeSource) -> Harness {
    harness_with(source, JobsConfig::default())
}

pub fn harness_with(source: FakeSource, config: JobsConfig) -> Harness {
    let temp = TempDir::new().unwrap();
    let library = Library::new(temp.path().join("library"));
    let source = Arc::new(source);
    let adapter: Arc<dyn SourceAdapter> = source.clone();
    let services = JobServices::new(
        config,
        Arc::new(SourceRegistry::new(vec![adapter])),
        library.clone(),
        Arc::new(Catalog::new()),
    );
    Harness {
        temp,
        source,
        library,
        manager: JobManager::new(services),
    }
}

/// Poll `check` until it returns `Some`, failing the test after 10 seconds
pub async fn eventually<T>(mut check: impl FnMut() -> Option<T>) -> T {
    for _ in 0..1000 {
        if let Some(value) = check() {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

pub async fn wait_for_search(manager: &JobManager, job_id: &str) -> SearchResults {
    eventually(|| match manager.novels_found(Some(job_id)).unwrap() {
        Poll::Ready(results) => Some(results),
        Poll::Pending(_) => None,
    })
    .await
}

/// Keep calling `download` like a client would until it stops being pending
pub async fn drive_download(
    manager: &JobManager,
    job_id: &str,
    novel_id: usize,
    source_id: usize,
) -> DownloadStatus {
    eventually(|| match manager.download(Some(job_id), novel_id, source_id) {
        Ok(DownloadStatus::Pending(_)) => None,
        Ok(status) => Some(status),
        Err(e) => panic!("download rejected: {}", e),
    })
    .await
}

pub async fn drive_direct_download(manager: &JobManager, job_id: &str, url: &str) -> DownloadStatus {
    eventually(|| match manager.direct_download(Some(job_id), Some(url)) {
        Ok(DownloadStatus::Pending(_)) => None,
        Ok(status) => Some(status),
        Err(e) => panic!("direct download rejected: {}", e),
    })
    .await
}

pub async fn drive_update(manager: &JobManager, job_id: &str, url: &str) -> (bool, String) {
    eventually(|| match manager.update(Some(job_id), Some(url)) {
        Ok(UpdateStatus::Pending(_)) => None,
        Ok(UpdateStatus::Finished { success, message }) => Some((success, message)),
        Err(e) => panic!("update rejected: {}", e),
    })
    .await
}
