//! End-to-end job flows driven through JobManager

mod common;

use std::time::Duration;

use common::{
    drive_direct_download, drive_download, drive_update, eventually, harness, harness_with,
    wait_for_search, FakeSource, CHAPTER_BODY_LEN,
};
use shelfd::config::JobsConfig;
use shelfd::daemon::jobs::{DownloadStatus, JobError, Poll};
use shelfd::library::StoredChapter;

const TITLE: &str = "The Fake Novel";
const NOVEL_SLUG: &str = "the-fake-novel";
const SOURCE_SLUG: &str = "fake-example";

fn fake_source() -> FakeSource {
    FakeSource::new("fake.example")
        .with_novel(TITLE, 5)
        .with_novel("Another Fake Story", 2)
}

fn no_cooldown() -> JobsConfig {
    JobsConfig {
        update_cooldown_secs: 0,
        ..JobsConfig::default()
    }
}

#[tokio::test]
async fn test_search_reports_progress_then_results() {
    let h = harness(fake_source().with_delay(Duration::from_millis(100)));

    h.manager.create_session(Some("job-1"), Some("fake")).unwrap();
    match h.manager.novels_found(Some("job-1")).unwrap() {
        Poll::Pending(message) => assert!(!message.is_empty()),
        Poll::Ready(_) => panic!("search finished before the source answered"),
    }

    let results = wait_for_search(&h.manager, "job-1").await;
    assert_eq!(results.found, 2);
    assert_eq!(results.query, "fake");
    assert_eq!(results.content[0].title, TITLE);
    assert!(h.manager.services().snapshots.exists("job-1"));
}

#[tokio::test]
async fn test_search_without_hits_is_empty_not_missing() {
    let h = harness(fake_source());
    h.manager.create_session(Some("job-1"), Some("nothing matches")).unwrap();

    let results = wait_for_search(&h.manager, "job-1").await;
    assert_eq!(results.found, 0);
    assert!(results.content.is_empty());
}

#[tokio::test]
async fn test_invalid_session_requests_are_rejected() {
    let h = harness(fake_source());

    assert_eq!(
        h.manager.create_session(Some("job-1"), Some("abc")),
        Err(JobError::QueryTooShort)
    );
    assert_eq!(
        h.manager.create_session(None, Some("fake novel")),
        Err(JobError::MissingJobId)
    );
    assert_eq!(
        h.manager.create_session(Some("job-1"), Some("  ")),
        Err(JobError::MissingQuery)
    );

    // Nothing was registered
    assert_eq!(
        h.manager.novels_found(Some("job-1")),
        Err(JobError::UnknownJob)
    );
    assert_eq!(common::FakeSource::calls(&h.source.search_calls), 0);
}

#[tokio::test]
async fn test_failed_search_crashes_the_job() {
    let h = harness(fake_source());
    h.source.set_fail_search(true);

    h.manager.create_session(Some("job-1"), Some("fake")).unwrap();
    let message = eventually(|| match h.manager.novels_found(Some("job-1")) {
        Err(JobError::AlreadyFinished(message)) => Some(message),
        _ => None,
    })
    .await;
    assert!(message.starts_with("Fail to search novel : "));
    assert!(!h.manager.services().snapshots.exists("job-1"));
}

#[tokio::test]
async fn test_full_download_flow() {
    let h = harness(fake_source());

    h.manager.create_session(Some("job-1"), Some("fake novel")).unwrap();
    wait_for_search(&h.manager, "job-1").await;

    match h.manager.sources_found(Some("job-1"), 0).unwrap() {
        Poll::Ready(listing) => {
            assert_eq!(listing.novel, TITLE);
            assert_eq!(listing.content.len(), 1);
        }
        Poll::Pending(_) => panic!("job should be idle after search"),
    }

    let status = drive_download(&h.manager, "job-1", 0, 0).await;
    assert_eq!(
        status,
        DownloadStatus::Succeeded {
            message: "Successfully downloaded, destroying session".to_string(),
            url: Some(format!("{}/{}", NOVEL_SLUG, SOURCE_SLUG)),
        }
    );

    let dir = h.library.source_dir(NOVEL_SLUG, SOURCE_SLUG);
    for id in 1..=5 {
        assert!(dir.has_chapter(id), "chapter {} missing", id);
    }
    let first: StoredChapter = dir.read_chapter(1).unwrap();
    assert_eq!(first.images.len(), 1);
    let image = first.images.values().next().unwrap();
    assert!(dir.images_dir().join(image).is_file());

    let meta = dir.read_meta().unwrap();
    assert_eq!(meta.title, TITLE);
    assert_eq!(meta.cover.as_deref(), Some("cover.jpg"));
    assert!(meta.last_update_date.is_some());

    let entry = h.manager.services().catalog.get(NOVEL_SLUG).unwrap();
    assert_eq!(entry.sources[0].chapters, 5);

    // Success removes the snapshot, so it cannot be restored
    assert!(!h.manager.services().snapshots.exists("job-1"));
    assert_eq!(h.manager.load_snapshot(Some("job-1")), Err(JobError::NoSnapshot));

    let metrics = h.manager.services().metrics.snapshot();
    assert_eq!(metrics.jobs_succeeded, 1);
    assert_eq!(metrics.chapters_fetched, 5);
}

#[tokio::test]
async fn test_invalid_selection() {
    let h = harness(fake_source());
    h.manager.create_session(Some("job-1"), Some("fake")).unwrap();
    wait_for_search(&h.manager, "job-1").await;

    assert!(matches!(
        h.manager.sources_found(Some("job-1"), 9),
        Err(JobError::InvalidSelection(_))
    ));
    assert!(matches!(
        h.manager.download(Some("job-1"), 0, 3),
        Err(JobError::InvalidSelection(_))
    ));
    // Still usable
    assert!(matches!(
        h.manager.sources_found(Some("job-1"), 1),
        Ok(Poll::Ready(_))
    ));
}

#[tokio::test]
async fn test_crash_keeps_snapshot_for_restore() {
    let h = harness(fake_source());
    h.source.set_fail_chapter(Some(3));

    h.manager.create_session(Some("job-1"), Some("fake novel")).unwrap();
    let before = wait_for_search(&h.manager, "job-1").await;

    match drive_download(&h.manager, "job-1", 0, 0).await {
        DownloadStatus::Failed { message } => assert!(message.starts_with("Download failed : ")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(h.manager.services().snapshots.exists("job-1"));

    h.manager.load_snapshot(Some("job-1")).unwrap();
    match h.manager.novels_found(Some("job-1")).unwrap() {
        Poll::Ready(after) => assert_eq!(after, before),
        Poll::Pending(_) => panic!("restored job should be idle"),
    }

    // The restored job can download once the source recovers
    h.source.set_fail_chapter(None);
    let status = drive_download(&h.manager, "job-1", 0, 0).await;
    assert!(matches!(status, DownloadStatus::Succeeded { .. }));
}

#[tokio::test]
async fn test_retry_fetches_images_of_chapters_stored_before_crash() {
    let config = JobsConfig {
        workers: 1,
        ..JobsConfig::default()
    };
    let h = harness_with(fake_source(), config);
    h.source.set_fail_chapter(Some(3));

    h.manager.create_session(Some("job-1"), Some("fake novel")).unwrap();
    wait_for_search(&h.manager, "job-1").await;
    assert!(matches!(
        drive_download(&h.manager, "job-1", 0, 0).await,
        DownloadStatus::Failed { .. }
    ));

    // One worker: chapters 1 and 2 were stored before chapter 3 failed
    let dir = h.library.source_dir(NOVEL_SLUG, SOURCE_SLUG);
    assert!(dir.has_chapter(1));
    let image = dir.read_chapter(1).unwrap().images.into_values().next().unwrap();
    assert!(!dir.has_image(&image));
    assert_eq!(common::FakeSource::calls(&h.source.image_calls), 0);

    h.manager.load_snapshot(Some("job-1")).unwrap();
    h.source.set_fail_chapter(None);
    let status = drive_download(&h.manager, "job-1", 0, 0).await;
    assert!(matches!(status, DownloadStatus::Succeeded { .. }));

    // Chapter 1's image plus the cover
    assert!(dir.has_image(&image));
    assert_eq!(common::FakeSource::calls(&h.source.image_calls), 2);
    assert_eq!(dir.read_meta().unwrap().cover.as_deref(), Some("cover.jpg"));
}

#[tokio::test]
async fn test_load_snapshot_rejections() {
    let h = harness(fake_source().with_delay(Duration::from_millis(100)));

    assert_eq!(h.manager.load_snapshot(None), Err(JobError::InvalidJobId));
    assert_eq!(h.manager.load_snapshot(Some("nope")), Err(JobError::InvalidJobId));

    h.manager.create_session(Some("job-1"), Some("fake")).unwrap();
    assert_eq!(h.manager.load_snapshot(Some("job-1")), Err(JobError::NotFinished));
}

#[tokio::test]
async fn test_direct_download_reuse_and_overwrite() {
    let h = harness(fake_source());
    let url = h.source.novel_url(TITLE);

    let first = drive_direct_download(&h.manager, "dl", &url).await;
    let expected_url = Some(format!("{}/{}", NOVEL_SLUG, SOURCE_SLUG));
    match &first {
        DownloadStatus::Succeeded { url, .. } => assert_eq!(url, &expected_url),
        other => panic!("expected success, got {:?}", other),
    }
    let novel_calls = common::FakeSource::calls(&h.source.novel_calls);

    // Same URL: the finished record answers, nothing is fetched
    assert_eq!(
        h.manager.direct_download(Some("dl"), Some(&url)).unwrap(),
        first
    );
    assert_eq!(common::FakeSource::calls(&h.source.novel_calls), novel_calls);

    // Different URL: a new job replaces the finished one
    let other = h.source.novel_url("Another Fake Story");
    assert!(matches!(
        h.manager.direct_download(Some("dl"), Some(&other)).unwrap(),
        DownloadStatus::Pending(_)
    ));
    match drive_direct_download(&h.manager, "dl", &other).await {
        DownloadStatus::Succeeded { url, .. } => {
            assert_eq!(url, Some(format!("another-fake-story/{}", SOURCE_SLUG)))
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_direct_download_rejects_bad_urls() {
    let h = harness(fake_source());
    assert_eq!(
        h.manager.direct_download(Some("dl"), None),
        Err(JobError::MissingUrl)
    );
    assert_eq!(
        h.manager.direct_download(Some("dl"), Some("ftp://fake.example/x")),
        Err(JobError::InvalidUrl)
    );

    // Unknown site crashes the job instead of rejecting the request
    let status = drive_direct_download(&h.manager, "dl", "https://unknown.example/n").await;
    match status {
        DownloadStatus::Failed { message } => {
            assert!(message.starts_with("Fail to init source : "))
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_update_without_changes_fetches_nothing() {
    let h = harness_with(fake_source(), no_cooldown());
    let url = h.source.novel_url(TITLE);
    drive_direct_download(&h.manager, "dl", &url).await;
    let chapter_calls = common::FakeSource::calls(&h.source.chapter_calls);

    let (success, message) = drive_update(&h.manager, "up-1", &url).await;
    assert!(success);
    assert_eq!(message, "No new chapters");
    assert_eq!(common::FakeSource::calls(&h.source.chapter_calls), chapter_calls);
    assert_eq!(h.manager.services().metrics.snapshot().updates_without_changes, 1);
}

#[tokio::test]
async fn test_update_refetches_corrupted_and_new_chapters() {
    let h = harness_with(fake_source(), no_cooldown());
    let url = h.source.novel_url(TITLE);
    drive_direct_download(&h.manager, "dl", &url).await;
    let chapter_calls = common::FakeSource::calls(&h.source.chapter_calls);

    let dir = h.library.source_dir(NOVEL_SLUG, SOURCE_SLUG);
    let mut broken = dir.read_chapter(2).unwrap();
    broken.body = "too short".to_string();
    dir.write_chapter(&broken).unwrap();
    h.source.set_chapters(TITLE, 7);

    let (success, message) = drive_update(&h.manager, "up-1", &url).await;
    assert!(success, "update failed: {}", message);

    // Chapter 2 plus the two new ones
    assert_eq!(
        common::FakeSource::calls(&h.source.chapter_calls),
        chapter_calls + 3
    );
    assert_eq!(dir.read_chapter(2).unwrap().body.len(), CHAPTER_BODY_LEN);
    assert!(dir.has_chapter(7));
    assert_eq!(dir.read_meta().unwrap().chapters.len(), 7);
    assert_eq!(h.manager.services().metrics.snapshot().chapters_repaired, 1);
}

#[tokio::test]
async fn test_update_keeps_stored_cover() {
    let h = harness_with(fake_source(), no_cooldown());
    let url = h.source.novel_url(TITLE);
    drive_direct_download(&h.manager, "dl", &url).await;

    let dir = h.library.source_dir(NOVEL_SLUG, SOURCE_SLUG);
    let mut broken = dir.read_chapter(4).unwrap();
    broken.body.clear();
    dir.write_chapter(&broken).unwrap();
    let image_calls = common::FakeSource::calls(&h.source.image_calls);
    h.source.set_fail_images(true);

    let (success, message) = drive_update(&h.manager, "up-1", &url).await;
    assert!(success, "update failed: {}", message);
    assert_eq!(dir.read_meta().unwrap().cover.as_deref(), Some("cover.jpg"));
    assert!(dir.path().join("cover.jpg").is_file());
    assert_eq!(common::FakeSource::calls(&h.source.image_calls), image_calls);
}

#[tokio::test]
async fn test_update_cooldown() {
    let h = harness(fake_source());
    let url = h.source.novel_url(TITLE);
    drive_direct_download(&h.manager, "dl", &url).await;

    assert_eq!(
        h.manager.update(Some("up-1"), Some(&url)),
        Err(JobError::RecentlyUpdated)
    );
    assert_eq!(h.manager.update(Some("up-1"), None), Err(JobError::MissingUrl));
}

#[tokio::test]
async fn test_stats_track_jobs() {
    let h = harness(fake_source());
    h.manager.create_session(Some("job-1"), Some("fake")).unwrap();
    wait_for_search(&h.manager, "job-1").await;

    let stats = h.manager.stats();
    assert_eq!(stats.active_jobs, 1);
    assert_eq!(stats.finished_jobs, 0);
    assert_eq!(stats.snapshots, 1);
    assert_eq!(stats.sources, 1);
}
