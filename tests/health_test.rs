mod helpers;

use cairn::config::HealthConfig;
use cairn::db::Statement;
use cairn::memory::forget::{bulk_forget_by_ids, rebuild_fts, vacuum};
use cairn::memory::health::{
    append_warnings, check_storage_health, FTS_INDEX_DRIFT, SOFT_DELETED_BACKLOG,
};
use helpers::{add_note, seed_notes, test_db};

#[test]
fn backlog_of_700_in_900_is_reported() {
    let db = test_db();
    let ids = seed_notes(db.as_ref(), 900);
    assert_eq!(bulk_forget_by_ids(db.as_ref(), &ids[..700]).unwrap(), 700);

    let warnings = check_storage_health(db.as_ref(), &HealthConfig::default());
    assert_eq!(warnings.len(), 1);
    let backlog = &warnings[0];
    assert_eq!(backlog.code, SOFT_DELETED_BACKLOG);
    assert!(backlog.message.contains("700 of 900"));
    assert!(!backlog.remediation.is_empty());
    assert!(backlog.remediation[0].starts_with("cairn vacuum"));

    // following the remediation clears the warning
    vacuum(db.as_ref(), 0).unwrap();
    assert!(check_storage_health(db.as_ref(), &HealthConfig::default()).is_empty());
}

#[test]
fn small_backlog_stays_quiet() {
    let db = test_db();
    let ids = seed_notes(db.as_ref(), 10);
    bulk_forget_by_ids(db.as_ref(), &ids[..9]).unwrap();
    assert!(check_storage_health(db.as_ref(), &HealthConfig::default()).is_empty());
}

#[test]
fn fts_drift_is_repaired_by_rebuild() {
    let db = test_db();
    add_note(db.as_ref(), "indexed memory");
    add_note(db.as_ref(), "another indexed memory");
    db.execute(&Statement::new(
        "DELETE FROM memories_fts WHERE rowid = (SELECT MIN(seq) FROM memories)",
    ))
    .unwrap();

    let warnings = check_storage_health(db.as_ref(), &HealthConfig::default());
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, FTS_INDEX_DRIFT);

    assert_eq!(rebuild_fts(db.as_ref()).unwrap(), 2);
    assert!(check_storage_health(db.as_ref(), &HealthConfig::default()).is_empty());
}

#[test]
fn warnings_decorate_success_only() {
    let db = test_db();
    add_note(db.as_ref(), "x");
    db.execute(&Statement::new("DELETE FROM memories_fts")).unwrap();
    let warnings = check_storage_health(db.as_ref(), &HealthConfig::default());

    let ok: Result<String, String> = Ok("{\"total\": 1}".into());
    let decorated = append_warnings(ok, &warnings).unwrap();
    assert!(decorated.contains("Storage warning:"));
    assert!(decorated.contains("cairn doctor --repair"));

    let failed: Result<String, String> = Err("search failed".into());
    assert_eq!(append_warnings(failed, &warnings).unwrap_err(), "search failed");

    let blank: Result<String, String> = Ok("  ".into());
    assert_eq!(append_warnings(blank, &warnings).unwrap(), "  ");
}
