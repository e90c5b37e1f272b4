use chrono::NaiveDate;
use runjournal_core::service::dashboard_service::DashboardOptions;
use runjournal_core::service::journal_list_service::UNKNOWN_TRACK_NAME;
use runjournal_core::{
    AppConfig, Coordinates, Journal, NewJournalEntry, NewTrack, ServiceError, Track,
};
use tempfile::TempDir;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn open_journal() -> (TempDir, Journal) {
    let dir = tempfile::tempdir().unwrap();
    let (journal, report) = Journal::open(AppConfig::new(dir.path())).unwrap();
    assert_eq!(report.rebuilt_count(), 4);
    (dir, journal)
}

fn measured_track(journal: &Journal, name: &str, parents: &[&str]) -> Track {
    journal
        .store()
        .create_track(
            NewTrack::new(name, parents.iter().map(|p| p.to_string()).collect()).with_waypoints(
                vec![Coordinates::new(49.0, 8.0), Coordinates::new(49.01, 8.0)],
            ),
        )
        .unwrap()
}

fn entry(on: NaiveDate, track_id: &str, laps: u32, custom_length: Option<u32>) -> NewJournalEntry {
    let mut entry = NewJournalEntry::new(on, track_id);
    entry.laps = laps;
    entry.custom_length = custom_length;
    entry
}

#[test]
fn journal_list_resolves_tracks_and_flags_missing_ones() {
    let (_dir, journal) = open_journal();
    let track = measured_track(&journal, "Loop", &[]);
    let store = journal.store();
    store
        .create_journal_entry(entry(date(2024, 1, 10), &track.id, 2, None))
        .unwrap();
    store
        .create_journal_entry(entry(date(2024, 1, 3), "ghost", 1, Some(4200)))
        .unwrap();
    store
        .create_journal_entry(entry(date(2024, 1, 10), &track.id, 1, Some(9000)))
        .unwrap();
    store
        .create_journal_entry(entry(date(2024, 2, 1), &track.id, 1, None))
        .unwrap();

    let items = journal
        .journal_list_service()
        .list_between(date(2024, 1, 1), date(2024, 2, 1))
        .unwrap();

    let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["2024/01/03", "2024/01/10", "2024/01/10a"]);
    assert_eq!(items[0].track_name, UNKNOWN_TRACK_NAME);
    assert!(items[0].track_error);
    assert_eq!(items[0].length, 4200);
    assert_eq!(items[1].track_name, "Loop");
    assert!(!items[1].track_error);
    assert_eq!(items[1].length, track.length() * 2);
    assert_eq!(items[2].length, 9000);
}

#[test]
fn journal_list_rejects_inverted_range() {
    let (_dir, journal) = open_journal();
    let result = journal
        .journal_list_service()
        .list_between(date(2024, 2, 1), date(2024, 1, 1));
    assert!(matches!(result, Err(ServiceError::InvalidRange { .. })));

    let empty = journal
        .journal_list_service()
        .list_between(date(2024, 1, 1), date(2024, 1, 1))
        .unwrap();
    assert!(empty.is_empty());
}

#[test]
fn dashboard_aggregates_days_months_and_top_tracks() {
    let (_dir, journal) = open_journal();
    let loop_track = measured_track(&journal, "Loop", &["Park"]);
    let hill = measured_track(&journal, "Hill", &[]);
    let length = u64::from(loop_track.length());
    let store = journal.store();
    store
        .create_journal_entry(entry(date(2024, 1, 10), &loop_track.id, 1, None))
        .unwrap();
    store
        .create_journal_entry(entry(date(2024, 1, 10), &loop_track.id, 2, None))
        .unwrap();
    store
        .create_journal_entry(entry(date(2024, 2, 5), &hill.id, 1, Some(5000)))
        .unwrap();
    store
        .create_journal_entry(entry(date(2024, 2, 6), "ghost", 1, Some(700)))
        .unwrap();
    store
        .create_journal_entry(entry(date(2024, 3, 1), &hill.id, 1, Some(100)))
        .unwrap();

    let dashboard = journal
        .dashboard_service()
        .load(DashboardOptions {
            from: date(2024, 1, 1),
            to: date(2024, 3, 1),
            top_tracks: 5,
        })
        .unwrap();

    let mut day_totals = vec![3 * length, 5000, 700];
    day_totals.sort_unstable();
    assert_eq!(dashboard.total_runs, 3);
    assert_eq!(dashboard.total_distance, 3 * length + 5700);
    assert_eq!(dashboard.median_distance, day_totals[1]);
    assert_eq!(dashboard.average_distance, (3 * length + 5700) / 3);

    let names: Vec<&str> = dashboard
        .top_tracks
        .iter()
        .map(|track| track.name.as_str())
        .collect();
    assert_eq!(names, vec!["Loop", "Hill"]);
    assert_eq!(dashboard.top_tracks[0].count, 2);
    assert_eq!(dashboard.top_tracks[0].parents, vec!["Park".to_string()]);

    assert_eq!(dashboard.analytics.len(), 2);
    let february = &dashboard.analytics[1];
    assert_eq!((february.year, february.month), (2024, 2));
    assert_eq!(february.total_distance, 5700);
    assert_eq!(february.total_runs, 2);
    assert_eq!(february.median_distance, 5000);
    assert_eq!(february.average_distance, 2850);

    let limited = journal
        .dashboard_service()
        .load(DashboardOptions {
            from: date(2024, 1, 1),
            to: date(2024, 3, 1),
            top_tracks: 1,
        })
        .unwrap();
    assert_eq!(limited.top_tracks.len(), 1);
}

#[test]
fn track_editor_returns_details_and_not_found() {
    let (_dir, journal) = open_journal();
    let track = measured_track(&journal, "Loop", &["Park"]);
    let run = journal
        .store()
        .create_journal_entry(entry(date(2024, 4, 4), &track.id, 1, None))
        .unwrap();

    let details = journal.track_editor_service().get_track(&track.id).unwrap();
    assert_eq!(details.track.name, "Loop");
    assert_eq!(details.length, track.length());
    assert_eq!(details.usages, vec![run.id]);

    journal.store().delete_track(&track.id).unwrap();
    assert!(matches!(
        journal.track_editor_service().get_track(&track.id),
        Err(ServiceError::TrackNotFound(_))
    ));
}

#[test]
fn track_tree_service_filters_by_name() {
    let (_dir, journal) = open_journal();
    measured_track(&journal, "Forest Loop", &["Park", "East"]);
    measured_track(&journal, "Harbour", &["City"]);

    let service = journal.track_tree_service();
    assert_eq!(service.tree(None).track_count(), 2);

    let filtered = service.tree(Some("forest"));
    assert_eq!(filtered.track_count(), 1);
    assert_eq!(filtered.nodes[0].name, "Park");
    assert_eq!(filtered.nodes[0].nodes[0].name, "East");

    assert!(service.tree(Some("desert")).is_empty());
}

#[test]
fn rebuild_through_journal_keeps_queries_working() {
    let (_dir, mut journal) = open_journal();
    let track = measured_track(&journal, "Loop", &[]);
    journal
        .store()
        .create_journal_entry(entry(date(2024, 5, 5), &track.id, 1, None))
        .unwrap();

    journal.rebuild().unwrap();

    assert_eq!(
        journal.engine().track_usages().get_usages(&track.id),
        vec!["2024/05/05"]
    );
    assert_eq!(journal.track_tree_service().tree(None).track_count(), 1);
}
