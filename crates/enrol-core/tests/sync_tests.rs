//! Tests for the SyncEngine

use enrol_core::store::SnapshotStore;
use enrol_core::{
    CourseId, Error, InstanceId, Interrupt, SyncConfig, SyncEngine, SyncOptions, SyncOutcome,
};
use enrol_test_utils::SnapshotFixture;
use pretty_assertions::assert_eq;
use serde_json::json;

fn load_store(fixture: &SnapshotFixture) -> SnapshotStore {
    fixture.write();
    SnapshotStore::load(&fixture.snapshot_path()).unwrap()
}

fn engine<'a>(config: &'a SyncConfig, store: &'a SnapshotStore) -> SyncEngine<'a> {
    SyncEngine::new(config, store, store, store, store)
}

fn disabled_config() -> SyncConfig {
    SyncConfig::parse("[sync]\nenabled = false\n").unwrap()
}

#[test]
fn test_scenario_e_dry_run_counts_without_mutating() {
    let store = load_store(&SnapshotFixture::canonical());
    let before = store.snapshot().clone();
    let config = SyncConfig::default();

    let report = engine(&config, &store)
        .sync_course(CourseId(1), &SyncOptions::dry_run())
        .unwrap();

    assert_eq!(report.change_count, 5);
    assert_eq!(report.planned, 5);
    assert!(report.actions.iter().all(|a| a.starts_with("[dry-run] Would ")));

    // No writes and no newly provisioned accounts.
    let after = store.snapshot();
    assert_eq!(after.users, before.users);
    assert_eq!(*after, before);
}

#[test]
fn test_live_sync_applies_and_second_run_is_empty() {
    let store = load_store(&SnapshotFixture::canonical());
    let config = SyncConfig::default();
    let engine = engine(&config, &store);

    let first = engine
        .sync_course(CourseId(1), &SyncOptions::default())
        .unwrap();
    assert_eq!(first.change_count, 5);
    assert!(first.failures.is_empty());
    assert_eq!(first.instances, vec![InstanceId(7)]);

    let second = engine
        .sync_course(CourseId(1), &SyncOptions::default())
        .unwrap();
    assert_eq!(second.change_count, 0);
    assert!(second.actions.is_empty());
}

#[test]
fn test_sync_course_disabled() {
    let store = load_store(&SnapshotFixture::canonical());
    let config = disabled_config();

    let result = engine(&config, &store).sync_course(CourseId(1), &SyncOptions::default());
    assert!(matches!(result, Err(Error::PluginDisabled)));
}

#[test]
fn test_sync_course_unknown_course() {
    let store = load_store(&SnapshotFixture::canonical());
    let config = SyncConfig::default();

    let result = engine(&config, &store).sync_course(CourseId(99), &SyncOptions::default());
    assert!(matches!(
        result,
        Err(Error::CourseNotFound {
            course_id: CourseId(99)
        })
    ));
}

#[test]
fn test_course_without_instances_is_empty() {
    let mut fixture = SnapshotFixture::canonical();
    fixture.course(2);
    let store = load_store(&fixture);
    let config = SyncConfig::default();

    let report = engine(&config, &store)
        .sync_course(CourseId(2), &SyncOptions::default())
        .unwrap();
    assert_eq!(report.change_count, 0);
    assert!(report.instances.is_empty());
}

#[test]
fn test_sync_all_disabled() {
    let store = load_store(&SnapshotFixture::canonical());
    let before = store.snapshot().clone();
    let config = disabled_config();

    let report = engine(&config, &store)
        .sync_all(&SyncOptions::default())
        .unwrap();

    assert_eq!(report.outcome, SyncOutcome::Disabled);
    assert!(report.courses.is_empty());
    assert_eq!(*store.snapshot(), before);
}

#[test]
fn test_sync_all_continues_past_failing_course() {
    let mut fixture = SnapshotFixture::canonical();
    // Course 3 has an instance but no course record.
    fixture
        .instance(9, 3, 300, "")
        // Course 4 carries a misconfigured instance.
        .course(4)
        .raw_instance(json!({
            "id": 10,
            "course_id": 4,
            "method": "manual",
            "course_key": 400,
        }))
        .course(5)
        .instance(11, 5, 500, "")
        .user(20, "hal")
        .membership(500, Some(5), 920, "hal", "R", "sds_convenor");
    let store = load_store(&fixture);
    let config = SyncConfig::default();

    let report = engine(&config, &store)
        .sync_all(&SyncOptions::default())
        .unwrap();

    assert_eq!(report.outcome, SyncOutcome::Completed);
    let synced: Vec<_> = report.courses.iter().map(|c| c.course_id).collect();
    assert_eq!(synced, vec![CourseId(1), CourseId(5)]);
    let failed: Vec<_> = report.errors.iter().map(|e| e.course_id).collect();
    assert_eq!(failed, vec![CourseId(3), CourseId(4)]);
    assert_eq!(report.change_count(), 6);
    assert!(!report.is_clean());
}

#[test]
fn test_sync_all_skips_disabled_instances() {
    let mut fixture = SnapshotFixture::canonical();
    fixture.course(2).raw_instance(json!({
        "id": 12,
        "course_id": 2,
        "course_key": 200,
        "enabled": false,
    }));
    let store = load_store(&fixture);
    let config = SyncConfig::default();

    let report = engine(&config, &store)
        .sync_all(&SyncOptions::dry_run())
        .unwrap();

    let synced: Vec<_> = report.courses.iter().map(|c| c.course_id).collect();
    assert_eq!(synced, vec![CourseId(1)]);
    assert!(report.dry_run);
    assert!(report.finished_at.is_some());
}

#[test]
fn test_sync_all_stops_when_interrupted() {
    let store = load_store(&SnapshotFixture::canonical());
    let before = store.snapshot().clone();
    let config = SyncConfig::default();

    let interrupt = Interrupt::new();
    interrupt.trigger();
    let options = SyncOptions {
        dry_run: false,
        interrupt: Some(interrupt),
    };

    let report = engine(&config, &store).sync_all(&options).unwrap();

    assert_eq!(report.outcome, SyncOutcome::Interrupted);
    assert!(report.courses.is_empty());
    assert_eq!(*store.snapshot(), before);
}

#[test]
fn test_duplicate_course_key_uses_lowest_instance() {
    let mut fixture = SnapshotFixture::new();
    fixture
        .course(1)
        .instance(8, 1, 100, "")
        .instance(6, 1, 100, "")
        .user(10, "u1")
        .membership(100, Some(1), 900, "u1", "R", "sds_student");
    let store = load_store(&fixture);
    let config = SyncConfig::default();

    let report = engine(&config, &store)
        .sync_course(CourseId(1), &SyncOptions::default())
        .unwrap();

    assert_eq!(report.instances, vec![InstanceId(6)]);
    assert_eq!(report.change_count, 1);
    assert_eq!(store.snapshot().enrolments[0].instance_id, InstanceId(6));
}

#[test]
fn test_report_serializes_to_json() {
    let store = load_store(&SnapshotFixture::canonical());
    let config = SyncConfig::default();

    let report = engine(&config, &store)
        .sync_all(&SyncOptions::dry_run())
        .unwrap();
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["outcome"], "completed");
    assert_eq!(value["courses"][0]["course_id"], 1);
    assert_eq!(value["courses"][0]["change_count"], 5);
}

#[test]
fn test_disabled_instance_members_are_left_alone() {
    let mut fixture = SnapshotFixture::new();
    fixture
        .course(1)
        .instance(7, 1, 100, "")
        .raw_instance(json!({
            "id": 8,
            "course_id": 1,
            "method": "external",
            "course_key": 200,
            "enabled": false,
        }))
        .user(10, "u1")
        .user(11, "u2")
        .membership(100, Some(1), 900, "u1", "R", "sds_student")
        .enrolment(1, 8, 11, "external")
        .role(1, 11, 5, "sync");
    let store = load_store(&fixture);
    let config = SyncConfig::default();
    let engine = engine(&config, &store);

    let report = engine
        .sync_course(CourseId(1), &SyncOptions::default())
        .unwrap();

    assert_eq!(
        report.actions,
        vec!["Enrol u1 on course 1 via instance 7 as role 5".to_string()]
    );
    let snapshot = store.snapshot();
    assert!(snapshot
        .enrolments
        .iter()
        .any(|e| e.user_id.get() == 11 && e.instance_id == InstanceId(8)));
    assert!(snapshot
        .role_assignments
        .iter()
        .any(|r| r.user_id.get() == 11 && r.role_id.get() == 5));
    drop(snapshot);

    let second = engine
        .sync_course(CourseId(1), &SyncOptions::default())
        .unwrap();
    assert!(second.actions.is_empty());
}

#[test]
fn test_unprovisionable_user_is_skipped() {
    let mut fixture = SnapshotFixture::canonical();
    // zed has a membership but no Connect user record to provision from.
    fixture.membership(100, Some(1), 999, "zed", "R", "sds_student");
    let store = load_store(&fixture);
    let config = SyncConfig::default();

    let report = engine(&config, &store)
        .sync_course(CourseId(1), &SyncOptions::default())
        .unwrap();

    assert_eq!(report.change_count, 5);
    assert!(report.failures.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].username.as_str(), "zed");
    assert!(!store.snapshot().users.iter().any(|u| u.username.as_str() == "zed"));
}
