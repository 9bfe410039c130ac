use anyhow::{Context, Result};
use std::path::Path;

use crate::config::CairnConfig;
use crate::db::Database;
use crate::memory::transfer::{import_memories, ExportData, ImportOptions};

use super::ScopeFlags;

/// Import memories from an export file. Scope flags override every entry's
/// own scope.
pub fn import(db: &dyn Database, config: &CairnConfig, file: &Path, scope: &ScopeFlags) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;
    let data: ExportData = serde_json::from_str(&json).context("failed to parse import JSON")?;

    println!("Importing {} memories...", data.memories.len());

    let opts = ImportOptions {
        scope: scope.args(),
        default_project: config.default_project().map(str::to_string),
    };
    let report = import_memories(db, &data, &opts)?;

    println!("Import complete:");
    println!("  Imported:   {}", report.imported);
    println!("  Duplicates: {} (already stored)", report.duplicates);
    if !report.rejected.is_empty() {
        println!("  Rejected:   {}", report.rejected.len());
        for rejection in &report.rejected {
            println!("    #{}: {}", rejection.index, rejection.reason);
        }
    }
    Ok(())
}
