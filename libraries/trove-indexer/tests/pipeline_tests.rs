//! Integration tests for the scan pipeline: walkers, cache store, snapshots


use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use test_helpers::{
    create_audio_file, create_library, pass_completions, set_mtime, CountingExtractor, Harness,
};
use trove_core::ScanEvent;
use trove_indexer::ScanStart;

#[tokio::test]
async fn test_pass_completes_once_with_no_roots() {
    let temp = TempDir::new().unwrap();
    let mut harness = Harness::start(&temp.path().join("cache.json"), vec![]);

    let started = harness.handle.start_scan().await.unwrap();
    assert_eq!(
        started,
        ScanStart::Started {
            pass_id: 1,
            roots: vec![]
        }
    );

    let events = harness.wait_for_pass().await;
    assert_eq!(pass_completions(&events), 1);
    assert!(!harness.handle.is_scanning().await.unwrap());
    assert!(harness.drain_events().is_empty());

    harness.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pass_completes_once_with_one_root() {
    let temp = TempDir::new().unwrap();
    let music = temp.path().join("music");
    let files = create_library(&music);
    let mut harness = Harness::start(&temp.path().join("cache.json"), vec![music.clone()]);

    harness.handle.start_scan().await.unwrap();
    let events = harness.wait_for_pass().await;

    assert_eq!(pass_completions(&events), 1);
    match events.last() {
        Some(ScanEvent::PassComplete {
            pass_id,
            progress,
            total_entries,
            offline_entries,
        }) => {
            assert_eq!(*pass_id, 1);
            assert_eq!(progress.files_found, files.len() as u64);
            // music, Artist, Album One, Album Two
            assert_eq!(progress.dirs_visited, 4);
            assert_eq!(*total_entries, files.len());
            assert_eq!(*offline_entries, 0);
        }
        other => panic!("expected PassComplete last, got {:?}", other),
    }

    let entries = harness.handle.all_entries().await.unwrap();
    assert_eq!(entries.len(), files.len());
    assert!(entries.iter().all(|e| e.path.ends_with(".flac")));
    assert!(entries.iter().all(|e| e.size == 1000 && e.mtime == 1_650_000_000));
    assert_eq!(harness.extractor.total_calls(), files.len());

    harness.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pass_completes_once_with_three_roots_including_missing() {
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("first");
    let second = temp.path().join("second");
    let missing = temp.path().join("missing");
    create_audio_file(&first, "a.mp3", 1_650_000_000);
    create_audio_file(&second, "b.ogg", 1_650_000_000);

    let mut harness = Harness::start(
        &temp.path().join("cache.json"),
        vec![first, missing.clone(), second],
    );

    harness.handle.start_scan().await.unwrap();
    let events = harness.wait_for_pass().await;

    assert_eq!(pass_completions(&events), 1);
    assert!(matches!(events.last(), Some(ScanEvent::PassComplete { .. })));

    let finished: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::WalkerFinished { root, stats, .. } => Some((root.clone(), *stats)),
            _ => None,
        })
        .collect();
    assert_eq!(finished.len(), 3);
    let (_, missing_stats) = finished.iter().find(|(root, _)| *root == missing).unwrap();
    assert_eq!(missing_stats.dir_errors, 1);

    assert_eq!(harness.handle.entries().await.unwrap().len(), 2);
    harness.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unchanged_rescan_never_extracts() {
    let temp = TempDir::new().unwrap();
    let music = temp.path().join("music");
    create_library(&music);
    let mut harness = Harness::start(&temp.path().join("cache.json"), vec![music]);

    harness.handle.start_scan().await.unwrap();
    harness.wait_for_pass().await;
    let before = harness.handle.entries().await.unwrap();
    harness.extractor.reset();

    harness.handle.start_scan().await.unwrap();
    let events = harness.wait_for_pass().await;

    assert_eq!(harness.extractor.total_calls(), 0);
    assert_eq!(harness.handle.entries().await.unwrap(), before);
    assert!(!events
        .iter()
        .any(|e| matches!(e, ScanEvent::ItemsChanged { .. })));

    let unchanged: u64 = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::WalkerFinished { stats, .. } => Some(stats.unchanged),
            _ => None,
        })
        .sum();
    assert_eq!(unchanged, before.len() as u64);

    harness.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_mtime_change_forces_reextraction_of_that_file_only() {
    let temp = TempDir::new().unwrap();
    let music = temp.path().join("music");
    let files = create_library(&music);
    let mut harness = Harness::start(&temp.path().join("cache.json"), vec![music]);

    harness.handle.start_scan().await.unwrap();
    harness.wait_for_pass().await;
    harness.extractor.reset();

    let touched = &files[2];
    set_mtime(touched, 1_650_000_001);

    harness.handle.start_scan().await.unwrap();
    let events = harness.wait_for_pass().await;

    assert_eq!(harness.extractor.total_calls(), 1);
    assert_eq!(harness.extractor.calls_for(touched), 1);

    let changed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::ItemsChanged { items, .. } => Some(items.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].path, touched.to_str().unwrap());
    assert_eq!(changed[0].mtime, 1_650_000_001);

    harness.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_equal_fingerprint_keeps_existing_fields() {
    let temp = TempDir::new().unwrap();
    let music = temp.path().join("music");
    let path = create_audio_file(&music, "kept.mp3", 1_650_000_000);
    let mut harness = Harness::start(&temp.path().join("cache.json"), vec![music]);

    let mut known = trove_core::MediaItem::new(path.to_str().unwrap());
    known.title = "Hand Edited".to_string();
    known.artist = "Curated".to_string();
    known.size = 1000;
    known.mtime = 1_650_000_000;
    harness.handle.add_or_update(known.clone()).await.unwrap();

    harness.handle.start_scan().await.unwrap();
    harness.wait_for_pass().await;

    assert_eq!(harness.extractor.calls_for(&path), 0);
    assert_eq!(harness.handle.all_entries().await.unwrap(), vec![known]);

    harness.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unconfigured_root_entries_are_kept_offline() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("cache.json");
    let music = temp.path().join("music");
    let usb = temp.path().join("usb");
    create_audio_file(&music, "home.mp3", 1_650_000_000);
    create_audio_file(&usb, "away.mp3", 1_650_000_000);

    let mut both = Harness::start(&snapshot, vec![music.clone(), usb.clone()]);
    both.handle.start_scan().await.unwrap();
    both.wait_for_pass().await;
    both.handle.shutdown().await.unwrap();

    let mut home_only = Harness::start(&snapshot, vec![music.clone()]);
    assert_eq!(home_only.handle.load_cache().await.unwrap(), 2);
    home_only.handle.start_scan().await.unwrap();
    let events = home_only.wait_for_pass().await;

    assert!(matches!(
        events.last(),
        Some(ScanEvent::PassComplete {
            total_entries: 2,
            offline_entries: 1,
            ..
        })
    ));

    let entries = home_only.handle.all_entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        let under_usb = entry.path.starts_with(usb.to_str().unwrap());
        assert_eq!(entry.offline, under_usb, "{}", entry.path);
    }
    // The usb root was never walked in this pass
    assert_eq!(home_only.extractor.total_calls(), 0);

    home_only.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_snapshot_seeds_fast_skip_after_restart() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("state").join("cache.json");
    let music = temp.path().join("music");
    let files = create_library(&music);

    let mut first = Harness::start(&snapshot, vec![music.clone()]);
    first.handle.start_scan().await.unwrap();
    first.wait_for_pass().await;
    let scanned = first.handle.entries().await.unwrap();
    first.handle.shutdown().await.unwrap();
    assert!(snapshot.exists());

    let extractor = Arc::new(CountingExtractor::default());
    let mut second = Harness::start_with(&snapshot, vec![music], extractor.clone());
    assert_eq!(second.handle.load_cache().await.unwrap(), files.len());
    assert_eq!(second.handle.entries().await.unwrap(), scanned);

    second.handle.start_scan().await.unwrap();
    second.wait_for_pass().await;

    assert_eq!(extractor.total_calls(), 0);
    assert_eq!(second.handle.entries().await.unwrap(), scanned);

    second.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_corrupt_snapshot_forces_full_rescan() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("cache.json");
    let music = temp.path().join("music");
    let files = create_library(&music);
    fs::write(&snapshot, b"not json at all").unwrap();

    let mut harness = Harness::start(&snapshot, vec![music]);
    assert_eq!(harness.handle.load_cache().await.unwrap(), 0);

    harness.handle.start_scan().await.unwrap();
    harness.wait_for_pass().await;

    assert_eq!(harness.extractor.total_calls(), files.len());
    harness.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_extraction_failure_is_recorded_with_filename_title() {
    let temp = TempDir::new().unwrap();
    let music = temp.path().join("music");
    let path = create_audio_file(&music, "broken take.m4a", 1_650_000_000);
    let mut harness = Harness::start(&temp.path().join("cache.json"), vec![music]);

    harness.handle.start_scan().await.unwrap();
    harness.wait_for_pass().await;

    let entries = harness.handle.entries().await.unwrap();
    let entry = &entries[path.to_str().unwrap()];
    assert_eq!(entry.title, "broken take");
    assert!(entry.artist.is_empty());
    assert_eq!(entry.size, 1000);

    harness.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_extractor_panic_does_not_wedge_the_store() {
    let temp = TempDir::new().unwrap();
    let music = temp.path().join("music");
    let crashed = create_audio_file(&music, "crash.mp3", 1_650_000_000);
    let fine = create_audio_file(&music, "fine.mp3", 1_650_000_000);
    let mut harness = Harness::start(&temp.path().join("cache.json"), vec![music]);

    harness.handle.start_scan().await.unwrap();
    let events = harness.wait_for_pass().await;
    assert_eq!(pass_completions(&events), 1);
    assert!(!harness.handle.is_scanning().await.unwrap());

    let entries = harness.handle.entries().await.unwrap();
    assert_eq!(entries[crashed.to_str().unwrap()].title, "crash");
    assert_eq!(entries[fine.to_str().unwrap()].title, "Song fine");
    assert!(harness.snapshot_path.exists());

    // A later pass still starts and skips both files as unchanged
    let second = harness.handle.start_scan().await.unwrap();
    assert!(matches!(second, ScanStart::Started { pass_id: 2, .. }));
    harness.wait_for_pass().await;
    assert_eq!(harness.extractor.total_calls(), 2);

    harness.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_scan_still_completes_pass() {
    let temp = TempDir::new().unwrap();
    let music = temp.path().join("music");
    for disc in 0..10 {
        for track in 0..50 {
            create_audio_file(
                &music.join(format!("disc{}", disc)),
                &format!("{:02}.mp3", track),
                1_650_000_000,
            );
        }
    }
    let mut harness = Harness::start(&temp.path().join("cache.json"), vec![music]);

    harness.handle.start_scan().await.unwrap();
    harness.handle.stop_scan().await.unwrap();
    let events = harness.wait_for_pass().await;

    assert_eq!(pass_completions(&events), 1);
    assert!(!harness.handle.is_scanning().await.unwrap());

    // Whatever was merged before the stop is kept and persisted
    let merged = harness.handle.entries().await.unwrap().len();
    assert!(merged <= 500);
    assert_eq!(harness.extractor.total_calls(), merged);
    assert!(harness.snapshot_path.exists());

    harness.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_items_changed_events_carry_new_items() {
    let temp = TempDir::new().unwrap();
    let music = temp.path().join("music");
    for i in 0..250 {
        create_audio_file(&music, &format!("{:03}.wav", i), 1_650_000_000);
    }
    let mut harness = Harness::start(&temp.path().join("cache.json"), vec![music.clone()]);

    harness.handle.start_scan().await.unwrap();
    let events = harness.wait_for_pass().await;

    let batch_sizes: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::ItemsChanged { root, items } => {
                assert_eq!(root, &music);
                Some(items.len())
            }
            _ => None,
        })
        .collect();
    assert_eq!(batch_sizes, vec![100, 100, 50]);

    harness.handle.shutdown().await.unwrap();
}
