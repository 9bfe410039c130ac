//! CLI read commands: `search`, `list`, and `context`.

use anyhow::Result;

use crate::config::CairnConfig;
use crate::db::Database;
use crate::memory::search::{
    get_context, list as list_memories, search as search_memories, ContextOptions, ListFilter,
    SearchOptions,
};
use crate::memory::MemoryType;
use crate::prompt::format_context;

use super::{print_memories, ScopeFlags};

/// Run a search from the terminal.
pub fn search(
    db: &dyn Database,
    config: &CairnConfig,
    query: &str,
    memory_type: Option<&str>,
    limit: Option<usize>,
    scope: &ScopeFlags,
) -> Result<()> {
    let opts = SearchOptions {
        limit: limit.unwrap_or(config.retrieval.search_limit),
        scope: scope.read_filter(config)?,
        types: memory_type
            .map(str::parse::<MemoryType>)
            .transpose()?
            .into_iter()
            .collect(),
    };

    let results = search_memories(db, query, &opts)?;
    if !results.is_empty() {
        println!("Found {} result(s)\n", results.len());
    }
    print_memories(&results, "No results found.");
    Ok(())
}

pub fn list(
    db: &dyn Database,
    config: &CairnConfig,
    memory_type: Option<&str>,
    tags: Vec<String>,
    limit: Option<usize>,
    scope: &ScopeFlags,
) -> Result<()> {
    let filter = ListFilter {
        limit: Some(limit.unwrap_or(config.retrieval.list_limit)),
        types: memory_type
            .map(str::parse::<MemoryType>)
            .transpose()?
            .into_iter()
            .collect(),
        tags,
        global_only: false,
        scope: scope.read_filter(config)?,
    };

    print_memories(&list_memories(db, &filter)?, "No memories stored.");
    Ok(())
}

/// Print the memory section a prompt for `query` would receive.
pub fn context(
    db: &dyn Database,
    config: &CairnConfig,
    query: Option<&str>,
    limit: Option<usize>,
    scope: &ScopeFlags,
) -> Result<()> {
    let opts = ContextOptions {
        limit: limit.unwrap_or(config.retrieval.context_limit),
        scope: scope.read_filter(config)?,
    };
    let ctx = get_context(db, query, &opts)?;

    let section = format_context(&ctx);
    if section.is_empty() {
        eprintln!("Nothing to recall.");
    } else {
        println!("{section}");
    }
    Ok(())
}
