//! On-disk novel library
//!
//! Layout, relative to the library root:
//!
//! ```text
//! <novel_slug>/<source_slug>/
//!     meta.json
//!     cover.<ext>
//!     json/00001.json
//!     images/<hash>.<ext>
//! ```
//!
//! Every file is written through a temp file in the same directory and then
//! renamed into place, so readers never observe a partially written file.

mod catalog;

pub use catalog::{Catalog, CatalogEntry, CatalogSource};

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::types::{ChapterRef, NovelMetadata};

const META_FILE: &str = "meta.json";
const JSON_DIR: &str = "json";
const IMAGES_DIR: &str = "images";

/// Errors raised while reading or writing the library
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A chapter as stored in `json/<id>.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChapter {
    pub id: u32,
    pub title: String,
    pub url: String,
    pub body: String,
    /// Image URL -> file name under `images/`. The file may not exist yet
    /// when its fetch failed; the next download pass retries it.
    #[serde(default)]
    pub images: BTreeMap<String, String>,
}

/// Listing metadata stored in `meta.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovelMeta {
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// Cover file name, relative to the source folder
    #[serde(default)]
    pub cover: Option<String>,
    /// Novel page on the source
    pub url: String,
    /// Source slug
    pub source: String,
    #[serde(default)]
    pub chapters: Vec<ChapterRef>,
    #[serde(default)]
    pub last_update_date: Option<DateTime<Utc>>,
}

impl NovelMeta {
    /// Metadata for a freshly downloaded novel. `last_update_date` is set
    /// separately once the download is registered.
    pub fn from_novel(novel: &NovelMetadata, source_slug: &str, cover: Option<String>) -> Self {
        Self {
            title: novel.title.clone(),
            author: novel.author.clone().unwrap_or_default(),
            cover,
            url: novel.novel_url.clone(),
            source: source_slug.to_string(),
            chapters: novel.chapters.clone(),
            last_update_date: None,
        }
    }
}

/// Root of the novel library
#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
}

impl Library {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder for one novel from one source, without touching the filesystem
    pub fn source_dir(&self, novel_slug: &str, source_slug: &str) -> SourceDir {
        SourceDir::new(self.root.join(novel_slug).join(source_slug))
    }

    /// Folder for one novel from one source, created if missing
    pub fn ensure_source_dir(
        &self,
        novel_slug: &str,
        source_slug: &str,
    ) -> Result<SourceDir, LibraryError> {
        let dir = self.source_dir(novel_slug, source_slug);
        fs::create_dir_all(dir.json_dir())?;
        fs::create_dir_all(dir.images_dir())?;
        Ok(dir)
    }

    /// Every `(novel_slug, source folder)` pair that has a `meta.json`
    pub fn stored_sources(&self) -> Result<Vec<(String, SourceDir)>, LibraryError> {
        let mut found = Vec::new();
        if !self.root.is_dir() {
            return Ok(found);
        }

        for novel in fs::read_dir(&self.root)? {
            let novel = novel?;
            if !novel.file_type()?.is_dir() {
                continue;
            }
            let novel_slug = novel.file_name().to_string_lossy().into_owned();
            for source in fs::read_dir(novel.path())? {
                let source = source?;
                let dir = SourceDir::new(source.path());
                if source.file_type()?.is_dir() && dir.meta_path().is_file() {
                    found.push((novel_slug.clone(), dir));
                }
            }
        }

        found.sort_by(|a, b| a.1.path().cmp(b.1.path()));
        Ok(found)
    }
}

/// Folder holding one novel from one source
#[derive(Debug, Clone)]
pub struct SourceDir {
    path: PathBuf,
}

impl SourceDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn json_dir(&self) -> PathBuf {
        self.path.join(JSON_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.path.join(IMAGES_DIR)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.path.join(META_FILE)
    }

    pub fn chapter_path(&self, id: u32) -> PathBuf {
        self.json_dir().join(format!("{:05}.json", id))
    }

    pub fn has_chapter(&self, id: u32) -> bool {
        self.chapter_path(id).is_file()
    }

    pub fn read_chapter(&self, id: u32) -> Result<StoredChapter, LibraryError> {
        let content = fs::read_to_string(self.chapter_path(id))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write_chapter(&self, chapter: &StoredChapter) -> Result<(), LibraryError> {
        let json = serde_json::to_vec_pretty(chapter)?;
        write_atomic(&self.chapter_path(chapter.id), &json)
    }

    /// Delete a stored chapter; a missing file is not an error
    pub fn remove_chapter(&self, id: u32) -> Result<(), LibraryError> {
        match fs::remove_file(self.chapter_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn has_image(&self, name: &str) -> bool {
        self.images_dir().join(name).is_file()
    }

    /// Store an image, returning its file name under `images/`
    pub fn write_image(&self, url: &str, bytes: &[u8]) -> Result<String, LibraryError> {
        let name = image_file_name(url);
        write_atomic(&self.images_dir().join(&name), bytes)?;
        Ok(name)
    }

    /// Store the cover, returning its file name relative to the folder
    pub fn write_cover(&self, url: &str, bytes: &[u8]) -> Result<String, LibraryError> {
        let name = format!("cover.{}", image_extension(url));
        write_atomic(&self.path.join(&name), bytes)?;
        Ok(name)
    }

    /// Cover file name from `meta.json`, if that file is still on disk
    pub fn stored_cover(&self) -> Option<String> {
        let cover = self.read_meta().ok()?.cover?;
        self.path.join(&cover).is_file().then_some(cover)
    }

    pub fn read_meta(&self) -> Result<NovelMeta, LibraryError> {
        let content = fs::read_to_string(self.meta_path())?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write_meta(&self, meta: &NovelMeta) -> Result<(), LibraryError> {
        let json = serde_json::to_vec_pretty(meta)?;
        write_atomic(&self.meta_path(), &json)
    }

    /// Set `last_update_date` in `meta.json` to now
    pub fn touch_last_update(&self) -> Result<NovelMeta, LibraryError> {
        let mut meta = self.read_meta()?;
        meta.last_update_date = Some(Utc::now());
        self.write_meta(&meta)?;
        Ok(meta)
    }
}

/// Write `bytes` to `path` through a temp file in the same directory
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), LibraryError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| LibraryError::Io(e.error))?;
    Ok(())
}

/// File extension guessed from the URL path, `jpg` when there is none
fn image_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => "jpg".to_string(),
    }
}

/// Stable file name for an image URL
pub fn image_file_name(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("{}.{}", &hash[..16], image_extension(url))
}
