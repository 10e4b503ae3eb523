//! shelfd: light novel acquisition daemon
//!
//! Searches configured novel sites, lets a client pick a novel and a
//! source through a polling HTTP API, and downloads chapters, images and
//! covers into an on-disk library:
//! - Client-identified background jobs with snapshot/restore of searches
//! - Selector-driven source adapters (reqwest + scraper)
//! - Bounded-concurrency chapter and image fetching
//! - Integrity checks and incremental updates of stored novels

pub mod config;
pub mod daemon;
pub mod library;
pub mod source;
pub mod types;
pub mod util;

pub use config::Config;
pub use types::*;
