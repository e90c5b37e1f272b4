use chrono::NaiveDate;
use runjournal_core::events::{DomainEvent, EventBus, EventKind, TrackDeleted};
use runjournal_core::{
    BootstrapReport, BootstrapStatus, EngineConfig, EngineError, FileStore, NewJournalEntry,
    NewTrack, PrimaryStore, ProjectionEngine,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SNAPSHOT_FILES: [&str; 4] = [
    "trackIdMap.json",
    "trackUsages.json",
    "trackTree.json",
    "sortedJournalEntries.json",
];

struct Harness {
    store: Arc<FileStore>,
    engine: ProjectionEngine,
    report: BootstrapReport,
    bus: Arc<EventBus>,
}

fn projection_dir(data: &Path) -> PathBuf {
    data.join(".projection")
}

fn open(data: &Path) -> Harness {
    let bus = Arc::new(EventBus::new());
    let store = Arc::new(FileStore::new(data, Arc::clone(&bus)));
    store.init().unwrap();
    let (engine, report) = ProjectionEngine::initialize(
        EngineConfig::new(projection_dir(data)),
        Arc::clone(&store) as Arc<dyn PrimaryStore>,
        &bus,
    )
    .unwrap();
    Harness {
        store,
        engine,
        report,
        bus,
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn seed(harness: &Harness) -> String {
    let track = harness
        .store
        .create_track(NewTrack::new("Loop", vec!["Park".to_string()]))
        .unwrap();
    harness
        .store
        .create_journal_entry(NewJournalEntry::new(date(2023, 1, 5), &track.id))
        .unwrap();
    harness
        .store
        .create_journal_entry(NewJournalEntry::new(date(2023, 6, 15), &track.id))
        .unwrap();
    track.id
}

#[test]
fn first_start_rebuilds_and_restart_loads_snapshots() {
    let data = tempfile::tempdir().unwrap();
    let first = open(data.path());
    assert_eq!(first.report.rebuilt_count(), 4);
    for file in SNAPSHOT_FILES {
        assert!(projection_dir(data.path()).join(file).is_file(), "{file}");
    }
    seed(&first);
    drop(first);

    let second = open(data.path());
    assert_eq!(second.report.rebuilt_count(), 0);
    assert_eq!(
        second.report.status_of("trackUsages"),
        Some(BootstrapStatus::Loaded)
    );
}

#[test]
fn restart_from_snapshots_answers_identically() {
    let data = tempfile::tempdir().unwrap();
    let first = open(data.path());
    let track_id = seed(&first);
    let range = (date(2023, 1, 1), date(2024, 1, 1));

    let before = (
        first.engine.track_lookup().get(&track_id),
        first.engine.track_usages().get_usages(&track_id),
        first.engine.track_tree().get(),
        first.engine.journal_index().find_ids_between(range.0, range.1),
    );
    drop(first);

    let second = open(data.path());
    assert_eq!(second.report.rebuilt_count(), 0);
    let after = (
        second.engine.track_lookup().get(&track_id),
        second.engine.track_usages().get_usages(&track_id),
        second.engine.track_tree().get(),
        second.engine.journal_index().find_ids_between(range.0, range.1),
    );
    assert_eq!(before, after);
    assert_eq!(after.1, vec!["2023/01/05", "2023/06/15"]);
}

#[test]
fn corrupt_snapshot_rebuilds_only_that_projection() {
    let data = tempfile::tempdir().unwrap();
    let first = open(data.path());
    let track_id = seed(&first);
    drop(first);

    fs::write(
        projection_dir(data.path()).join("trackUsages.json"),
        b"[not valid",
    )
    .unwrap();

    let second = open(data.path());
    assert_eq!(
        second.report.status_of("trackUsages"),
        Some(BootstrapStatus::Rebuilt)
    );
    assert_eq!(
        second.report.status_of("trackIdMap"),
        Some(BootstrapStatus::Loaded)
    );
    assert_eq!(second.engine.track_usages().get_usages(&track_id).len(), 2);

    let bytes = fs::read(projection_dir(data.path()).join("trackUsages.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed[&track_id].as_array().unwrap().len(), 2);
}

#[test]
fn build_recreates_projection_dir_and_keeps_subscriptions() {
    let data = tempfile::tempdir().unwrap();
    let mut harness = open(data.path());
    let track_id = seed(&harness);
    let stray = projection_dir(data.path()).join("stray.json");
    fs::write(&stray, b"{}").unwrap();
    let handlers_before = harness.bus.handler_count(EventKind::TrackDeleted);

    harness.engine.build().unwrap();

    assert!(!stray.exists());
    for file in SNAPSHOT_FILES {
        assert!(projection_dir(data.path()).join(file).is_file(), "{file}");
    }
    assert_eq!(handlers_before, 3);
    assert_eq!(harness.bus.handler_count(EventKind::TrackDeleted), 3);
    assert_eq!(harness.bus.handler_count(EventKind::TrackMoved), 2);
    assert_eq!(harness.bus.handler_count(EventKind::JournalEntryUpserted), 2);

    harness.store.delete_track(&track_id).unwrap();
    assert_eq!(harness.engine.track_lookup().get(&track_id), None);
    assert_eq!(harness.engine.track_tree().get().track_count(), 0);
}

#[test]
fn unreadable_track_aborts_initialize() {
    let data = tempfile::tempdir().unwrap();
    let broken = data.path().join("tracks").join("broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("track.json"), b"{ nope").unwrap();

    let bus = EventBus::new();
    let store = Arc::new(FileStore::new(data.path(), Arc::new(EventBus::new())));
    let result = ProjectionEngine::initialize(
        EngineConfig::new(projection_dir(data.path())),
        store as Arc<dyn PrimaryStore>,
        &bus,
    );

    assert!(matches!(result, Err(EngineError::Scan(_))));
    assert_eq!(bus.handler_count(EventKind::TrackUpserted), 0);
}

#[test]
fn incremental_updates_are_written_through() {
    let data = tempfile::tempdir().unwrap();
    let harness = open(data.path());
    let track_id = seed(&harness);

    let bytes = fs::read(projection_dir(data.path()).join("trackIdMap.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed[&track_id], serde_json::json!(["Park"]));

    let bytes = fs::read(projection_dir(data.path()).join("sortedJournalEntries.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["2023"]["6"]["15"], serde_json::json!(["2023/06/15"]));
}

#[test]
fn failed_build_writes_no_snapshots_until_restart_rebuilds() {
    let data = tempfile::tempdir().unwrap();
    let mut harness = open(data.path());
    let kept = harness
        .store
        .create_track(NewTrack::new("A", Vec::new()))
        .unwrap();
    let broken = data.path().join("tracks").join("broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("track.json"), b"{ nope").unwrap();

    assert!(matches!(harness.engine.build(), Err(EngineError::Scan(_))));
    assert!(!harness.engine.is_ready());

    let added = harness
        .store
        .create_track(NewTrack::new("C", Vec::new()))
        .unwrap();
    assert_eq!(harness.engine.track_lookup().get(&added.id), Some(Vec::new()));
    for file in SNAPSHOT_FILES {
        assert!(!projection_dir(data.path()).join(file).exists(), "{file}");
    }
    drop(harness);

    fs::remove_dir_all(&broken).unwrap();
    let restarted = open(data.path());
    assert_eq!(restarted.report.rebuilt_count(), 4);
    assert!(restarted.engine.is_ready());
    assert_eq!(
        restarted.engine.track_lookup().get(&kept.id),
        Some(Vec::new())
    );
    assert_eq!(
        restarted.engine.track_lookup().get(&added.id),
        Some(Vec::new())
    );
    assert_eq!(restarted.engine.track_tree().get().track_count(), 2);
}

#[test]
fn successful_build_after_failure_restores_write_through() {
    let data = tempfile::tempdir().unwrap();
    let mut harness = open(data.path());
    let broken = data.path().join("tracks").join("broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("track.json"), b"{ nope").unwrap();
    assert!(harness.engine.build().is_err());

    fs::remove_dir_all(&broken).unwrap();
    harness.engine.build().unwrap();
    assert!(harness.engine.is_ready());

    let track = harness
        .store
        .create_track(NewTrack::new("Loop", vec!["Park".to_string()]))
        .unwrap();
    let bytes = fs::read(projection_dir(data.path()).join("trackIdMap.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed[&track.id], serde_json::json!(["Park"]));
}

#[test]
fn snapshot_write_failures_are_reported_through_the_bus() {
    let data = tempfile::tempdir().unwrap();
    let harness = open(data.path());
    let track_id = seed(&harness);
    let dir = projection_dir(data.path());
    fs::remove_dir_all(&dir).unwrap();
    fs::write(&dir, b"not a directory").unwrap();

    let report = harness
        .bus
        .publish(&DomainEvent::from(TrackDeleted { id: track_id.clone() }));

    assert_eq!(report.failed, 3);
    assert_eq!(harness.engine.track_lookup().get(&track_id), None);
    assert!(harness.engine.track_usages().get_usages(&track_id).is_empty());
}
