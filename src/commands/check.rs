use std::path::Path;

use anyhow::{Context, Result};
use shelfd::config::Config;
use shelfd::daemon::jobs::ChapterIntegrityChecker;
use shelfd::library::SourceDir;
use shelfd::util::truncate_str;

/// Offline integrity report of one stored source folder
pub fn check_novel(config: &Config, novel_dir: &Path, repair: bool) -> Result<()> {
    let dir = SourceDir::new(novel_dir);
    let meta = dir
        .read_meta()
        .with_context(|| format!("Failed to read {}", dir.meta_path().display()))?;

    let checker =
        ChapterIntegrityChecker::new(config.jobs.min_chapter_body_len).with_repair(repair);
    let report = checker.check(&dir, &meta.chapters);

    println!("{} ({})", truncate_str(&meta.title, 60), meta.source);
    println!("  Chapters listed: {}", meta.chapters.len());
    println!("  Stored:          {}", report.checked);
    println!("  Corrupted:       {}", report.corrupted.len());
    println!("  Missing:         {}", report.missing.len());
    if let Some(date) = meta.last_update_date {
        println!("  Last update:     {}", date.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    if !report.corrupted.is_empty() {
        let ids: Vec<String> = report.corrupted.iter().map(u32::to_string).collect();
        let action = if repair { "deleted" } else { "run with --repair to delete" };
        println!("  Corrupted ids:   {} ({})", ids.join(", "), action);
    }
    if !report.needs_download() {
        println!("  Up to date");
    }
    Ok(())
}
