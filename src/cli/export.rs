use anyhow::{Context, Result};
use std::path::Path;

use crate::db::Database;
use crate::memory::transfer::export_memories;
use crate::memory::ScopeFilter;

/// Export live memories as JSON to `output`, or stdout when `None`.
pub fn export(db: &dyn Database, scope: &ScopeFilter, output: Option<&Path>) -> Result<()> {
    let data = export_memories(db, scope)?;
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write export file: {}", path.display()))?;
            eprintln!("Exported {} memories to {}.", data.memories.len(), path.display());
        }
        None => {
            println!("{json}");
            eprintln!("Exported {} memories.", data.memories.len());
        }
    }
    Ok(())
}
