#![allow(dead_code)]

use std::sync::Arc;

use cairn::db::{self, Database};
use cairn::memory::store::{add, AddOptions};
use cairn::memory::{Memory, MemoryType, ScopeArgs};

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Arc<dyn Database> {
    db::open_memory_database().unwrap()
}

/// Add a global note. Returns the stored (or existing) memory.
pub fn add_note(db: &dyn Database, content: &str) -> Memory {
    add(db, content, &AddOptions::default()).unwrap().into_memory()
}

/// Add a memory of `memory_type` with explicit scope arguments.
pub fn add_scoped(
    db: &dyn Database,
    content: &str,
    memory_type: MemoryType,
    global: Option<bool>,
    project_id: Option<&str>,
) -> Memory {
    let opts = AddOptions {
        memory_type: Some(memory_type),
        scope: ScopeArgs::new(global, project_id.map(str::to_string)),
        ..Default::default()
    };
    add(db, content, &opts).unwrap().into_memory()
}

/// Add `count` distinct global notes, returning their ids in insertion order.
pub fn seed_notes(db: &dyn Database, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| add_note(db, &format!("seeded memory number {i}")).id)
        .collect()
}

pub fn count(db: &dyn Database, sql: &str) -> i64 {
    db.execute(&db::Statement::new(sql))
        .unwrap()
        .scalar_i64()
        .unwrap()
}
