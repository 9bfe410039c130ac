use anyhow::Result;

use crate::db::Database;

/// Display memory statistics in the terminal.
pub fn stats(db: &dyn Database) -> Result<()> {
    let response = crate::memory::stats::memory_stats(db)?;

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    println!("  Database:            {}", db.describe());
    println!("  Total memories:      {}", response.total_memories);
    println!("  Active:              {}", response.active_memories);
    println!("  Forgotten:           {}", response.deleted_memories);
    println!("  Pending embeddings:  {}", response.pending_embeddings);
    println!();

    println!("By Type:");
    for (t, count) in &response.by_type {
        println!("  {:<12} {}", t, count);
    }
    println!();

    println!("By Scope:");
    if response.by_scope.is_empty() {
        println!("  (none)");
    }
    for (s, count) in &response.by_scope {
        println!("  {:<20} {}", s, count);
    }
    println!();

    println!("Schema version:        {}", response.schema_version);
    println!(
        "Embedding model:       {}",
        response.embedding_model.as_deref().unwrap_or("(not set)")
    );
    if let Some(ref oldest) = response.oldest_memory {
        println!("Oldest memory:         {oldest}");
    }
    if let Some(ref newest) = response.newest_memory {
        println!("Newest memory:         {newest}");
    }

    Ok(())
}
