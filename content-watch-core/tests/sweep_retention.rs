use std::fs;

use chrono::{DateTime, Duration, Utc};
use tempfile::tempdir;

use content_watch_core::config::SweepConfig;
use content_watch_core::snapshot::{Snapshot, SnapshotStore, TrackedItem, SNAPSHOT_FILE};
use content_watch_core::sweep::{sweep_all, sweep_source};

fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-07-01T00:00:00+00:00")
        .unwrap()
        .with_timezone(&Utc)
}

fn aged_item(identity: &str, days_old: i64, size: u64, now: DateTime<Utc>) -> TrackedItem {
    TrackedItem::file(identity, format!("hash-{identity}"), size, now - Duration::days(days_old))
}

/// A store with one repo-style source: an old file with a backing artifact and
/// a recent one.
fn seeded_store(now: DateTime<Utc>) -> (tempfile::TempDir, SnapshotStore, String) {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let key = "repo_example_docs_release-notes".to_string();

    let mut snapshot = Snapshot::new();
    snapshot.insert("old.md".to_string(), aged_item("old.md", 120, 400, now));
    snapshot.insert("fresh.md".to_string(), aged_item("fresh.md", 5, 100, now));
    store.save(&key, &snapshot).unwrap();

    let files_dir = store.files_dir(&key);
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("old.md"), vec![b'x'; 400]).unwrap();
    fs::write(files_dir.join("fresh.md"), vec![b'y'; 100]).unwrap();

    (dir, store, key)
}

#[test]
fn dry_run_reports_candidates_without_mutating_anything() {
    let now = fixed_now();
    let (_dir, store, key) = seeded_store(now);

    let snapshot_path = store.source_dir(&key).join(SNAPSHOT_FILE);
    let snapshot_before = fs::read(&snapshot_path).unwrap();
    let old_file_before = fs::read(store.files_dir(&key).join("old.md")).unwrap();

    let config = SweepConfig {
        content_dir: store.root().to_path_buf(),
        age_threshold_days: 90,
        dry_run: true,
    };
    let report = sweep_all(&store, &config, now);

    assert!(report.dry_run);
    assert_eq!(report.candidate_count(), 1);
    assert_eq!(report.sources[0].candidates[0].identity, "old.md");
    assert_eq!(report.removed_count(), 0);
    assert_eq!(report.bytes_freed(), 0);

    // Byte-identical state after a dry run that found candidates.
    assert_eq!(fs::read(&snapshot_path).unwrap(), snapshot_before);
    assert_eq!(fs::read(store.files_dir(&key).join("old.md")).unwrap(), old_file_before);
}

#[test]
fn destructive_sweep_removes_artifact_and_entry() {
    let now = fixed_now();
    let (_dir, store, key) = seeded_store(now);

    let outcome = sweep_source(&store, &key, 90, true, now);

    assert_eq!(outcome.removed_count, 1);
    assert_eq!(outcome.bytes_freed, 400);
    assert!(!store.files_dir(&key).join("old.md").exists());
    assert!(store.files_dir(&key).join("fresh.md").exists());

    let persisted = store.load(&key);
    assert_eq!(persisted.len(), 1);
    assert!(persisted.contains_key("fresh.md"));
}

#[test]
fn destructive_sweep_without_backing_artifact_still_removes_entry() {
    let now = fixed_now();
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let key = "feed_0";

    let mut snapshot = Snapshot::new();
    let mut entry = aged_item("entry-1", 10, 50, now);
    entry.published = Some((now - Duration::days(200)).to_rfc3339());
    snapshot.insert("entry-1".to_string(), entry);
    store.save(key, &snapshot).unwrap();

    let outcome = sweep_source(&store, key, 90, true, now);

    assert_eq!(outcome.removed_count, 1);
    // No disk artifact was freed for a feed entry.
    assert_eq!(outcome.bytes_freed, 0);
    assert!(store.load(key).is_empty());
}

#[test]
fn sweep_below_threshold_persists_nothing() {
    let now = fixed_now();
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let key = "repo_example";

    let mut snapshot = Snapshot::new();
    snapshot.insert("fresh.md".to_string(), aged_item("fresh.md", 30, 100, now));
    store.save(key, &snapshot).unwrap();

    let snapshot_path = store.source_dir(key).join(SNAPSHOT_FILE);
    let before = fs::read(&snapshot_path).unwrap();

    let outcome = sweep_source(&store, key, 90, true, now);

    assert!(outcome.candidates.is_empty());
    assert_eq!(outcome.removed_count, 0);
    assert_eq!(fs::read(&snapshot_path).unwrap(), before);
}

#[test]
fn sweep_all_walks_every_stored_source() {
    let now = fixed_now();
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());

    let mut repo = Snapshot::new();
    repo.insert("old.md".to_string(), aged_item("old.md", 100, 10, now));
    store.save("repo_example", &repo).unwrap();

    let mut feed = Snapshot::new();
    feed.insert("entry-1".to_string(), aged_item("entry-1", 100, 20, now));
    store.save("feed_0", &feed).unwrap();

    let config = SweepConfig {
        content_dir: store.root().to_path_buf(),
        age_threshold_days: 90,
        dry_run: false,
    };
    let report = sweep_all(&store, &config, now);

    assert_eq!(report.sources.len(), 2);
    assert_eq!(report.removed_count(), 2);
    assert!(store.load("repo_example").is_empty());
    assert!(store.load("feed_0").is_empty());
}

#[test]
fn unparseable_first_seen_is_swept() {
    let now = fixed_now();
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let key = "repo_example";

    let mut snapshot = Snapshot::new();
    let mut item = aged_item("mystery.md", 0, 10, now);
    item.first_seen = "unknown".to_string();
    snapshot.insert("mystery.md".to_string(), item);
    store.save(key, &snapshot).unwrap();

    let outcome = sweep_source(&store, key, 90, true, now);

    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.candidates[0].age_days, None);
    assert_eq!(outcome.removed_count, 1);
    assert!(store.load(key).is_empty());
}
