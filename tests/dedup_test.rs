mod helpers;

use std::sync::Arc;
use std::thread;

use cairn::db::open_database;
use cairn::db::target::ConnectionTarget;
use cairn::memory::forget::forget;
use cairn::memory::search::{list, ListFilter};
use cairn::memory::store::{add, AddOptions, AddOutcome};
use cairn::memory::{MemoryType, ScopeArgs};
use helpers::{add_note, add_scoped, count, test_db};

#[test]
fn rule_added_twice_is_stored_once() {
    let db = test_db();
    let opts = AddOptions {
        memory_type: Some(MemoryType::Rule),
        scope: ScopeArgs::new(Some(true), None),
        ..Default::default()
    };

    let first = add(db.as_ref(), "Always use strict mode", &opts).unwrap();
    let second = add(db.as_ref(), "Always use strict mode", &opts).unwrap();

    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());
    assert_eq!(first.memory().id, second.memory().id);
    assert_eq!(
        count(db.as_ref(), "SELECT COUNT(*) FROM memories WHERE type = 'rule'"),
        1
    );
}

#[test]
fn normalization_catches_case_whitespace_and_trailing_punctuation() {
    let db = test_db();
    let original = add_note(db.as_ref(), "Run the tests before pushing");

    for variant in [
        "run the tests before pushing",
        "  Run   the tests\tbefore pushing  ",
        "Run the tests before pushing.",
        "RUN THE TESTS BEFORE PUSHING!?",
    ] {
        let outcome = add(db.as_ref(), variant, &AddOptions::default()).unwrap();
        assert!(outcome.is_duplicate(), "{variant:?} should be a duplicate");
        assert_eq!(outcome.memory().id, original.id);
    }

    // inner punctuation is significant
    let different = add(db.as_ref(), "Run the tests, before pushing", &AddOptions::default())
        .unwrap();
    assert!(!different.is_duplicate());
}

#[test]
fn same_content_in_different_scopes_is_not_a_duplicate() {
    let db = test_db();
    let global = add_scoped(db.as_ref(), "Use pnpm", MemoryType::Fact, Some(true), None);
    let web = add_scoped(db.as_ref(), "Use pnpm", MemoryType::Fact, None, Some("web"));
    let api = add_scoped(db.as_ref(), "Use pnpm", MemoryType::Fact, None, Some("api"));

    assert_ne!(global.id, web.id);
    assert_ne!(web.id, api.id);
    assert_eq!(count(db.as_ref(), "SELECT COUNT(*) FROM memories"), 3);
}

#[test]
fn forgotten_content_can_be_added_again() {
    let db = test_db();
    let first = add_note(db.as_ref(), "Deploys happen on Tuesdays");
    assert!(forget(db.as_ref(), &first.id).unwrap());

    let outcome = add(db.as_ref(), "Deploys happen on Tuesdays", &AddOptions::default()).unwrap();
    assert!(matches!(outcome, AddOutcome::Created(ref m) if m.id != first.id));

    let live = list(db.as_ref(), &ListFilter::default()).unwrap();
    assert_eq!(live.len(), 1);
}

#[test]
fn concurrent_identical_adds_create_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let target = ConnectionTarget::Local {
        path: dir.path().join("memory.db"),
    };
    // create the schema once up front
    open_database(&target).unwrap();
    let target = Arc::new(target);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let target = Arc::clone(&target);
            thread::spawn(move || {
                let db = open_database(&target).unwrap();
                add(db.as_ref(), "Only one of us wins", &AddOptions::default()).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<AddOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let created = outcomes.iter().filter(|o| !o.is_duplicate()).count();
    assert_eq!(created, 1);

    let ids: std::collections::HashSet<_> = outcomes.iter().map(|o| o.memory().id.clone()).collect();
    assert_eq!(ids.len(), 1, "every caller sees the same stored memory");

    let db = open_database(&target).unwrap();
    assert_eq!(count(db.as_ref(), "SELECT COUNT(*) FROM memories"), 1);
}
