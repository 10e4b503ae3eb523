//! Library and job orchestration configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where downloaded novels are stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root directory, novels live in `<root>/<novel>/<source>/`
    pub root: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("Lightnovels"),
        }
    }
}

/// Job orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Concurrent fetches per job
    pub workers: usize,
    /// Shortest accepted search query, in characters
    pub min_query_len: usize,
    /// Chapter bodies shorter than this are treated as corrupted
    pub min_chapter_body_len: usize,
    /// How long a finished update blocks another update of the same novel
    pub update_cooldown_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            min_query_len: 4,
            min_chapter_body_len: 100,
            update_cooldown_secs: 3600,
        }
    }
}
