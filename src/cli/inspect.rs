//! CLI `inspect` command: display full details for a single memory.

use anyhow::Result;

use crate::db::Database;
use crate::memory::store::get_by_id;

/// Inspect a single memory by ID and display full details.
pub fn inspect(db: &dyn Database, id: &str) -> Result<()> {
    let Some(m) = get_by_id(db, id)? else {
        anyhow::bail!("no active memory with id {id}");
    };

    println!("Memory: {}", m.id);
    println!("{}", "=".repeat(50));
    println!("  Type:           {}", m.memory_type);
    println!("  Scope:          {}", m.scope);
    if !m.tags.is_empty() {
        println!("  Tags:           {}", m.tags.join(", "));
    }
    if let Some(ref category) = m.category {
        println!("  Category:       {category}");
    }
    if !m.paths.is_empty() {
        println!("  Paths:          {}", m.paths.join(", "));
    }
    println!("  Embedded:       {}", if m.has_embedding { "yes" } else { "no" });
    println!("  Created:        {}", m.created_at);
    println!("  Updated:        {}", m.updated_at);
    println!();
    println!("Content:");
    println!("  {}", m.content);

    Ok(())
}
