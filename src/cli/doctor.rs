//! CLI `doctor` command: run storage health checks and print a report.

use anyhow::Result;

use crate::config::CairnConfig;
use crate::db::migrations::{get_embedding_model, get_schema_version};
use crate::db::Database;
use crate::memory::forget::rebuild_fts;
use crate::memory::health::{check_storage_health, FTS_INDEX_DRIFT};

/// Run diagnostics. With `repair`, rebuild the full-text index when it has
/// drifted and check again.
pub fn doctor(db: &dyn Database, config: &CairnConfig, repair: bool) -> Result<()> {
    let schema_version = get_schema_version(db)?;
    let stored_model = get_embedding_model(db)?;

    println!("cairn Health Report");
    println!("===================");
    println!();
    println!("Database:          {}", db.describe());
    println!("Schema version:    {schema_version}");
    println!();
    println!("Embedding model:");
    println!("  Stored:          {}", stored_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {}", config.embedding.model);
    if let Some(ref stored) = stored_model {
        if stored != &config.embedding.model {
            println!("  WARNING: model mismatch! Run `cairn embed --all` to update vectors.");
        } else {
            println!("  Status:          OK (match)");
        }
    }
    println!();

    let mut warnings = check_storage_health(db, &config.health);
    if repair && warnings.iter().any(|w| w.code == FTS_INDEX_DRIFT) {
        let indexed = rebuild_fts(db)?;
        println!("Rebuilt full-text index ({indexed} rows).");
        println!();
        warnings = check_storage_health(db, &config.health);
    }

    if warnings.is_empty() {
        println!("Storage checks:    PASSED");
        return Ok(());
    }

    println!("Storage checks:    {} warning(s)", warnings.len());
    for warning in &warnings {
        println!();
        println!("  [{}] ({}) {}", warning.code, warning.severity, warning.message);
        for (i, step) in warning.remediation.iter().enumerate() {
            println!("    {}. {step}", i + 1);
        }
    }
    Ok(())
}
