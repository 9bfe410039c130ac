//! CLI `add` and `forget` commands.

use anyhow::Result;

use crate::config::CairnConfig;
use crate::db::Database;
use crate::memory::forget::{bulk_forget_by_ids, find_to_forget, forget as forget_one, ForgetFilter};
use crate::memory::store::{add as add_memory, AddOptions, AddOutcome};
use crate::memory::{resolve_scope, MemoryType, ScopeFilter, ScopeIntent};

use super::{print_memories, ScopeFlags};

/// Store a memory from the command line.
pub fn add(
    db: &dyn Database,
    config: &CairnConfig,
    content: &str,
    memory_type: Option<&str>,
    tags: Vec<String>,
    scope: &ScopeFlags,
) -> Result<()> {
    let opts = AddOptions {
        memory_type: memory_type.map(str::parse::<MemoryType>).transpose()?,
        tags,
        scope: scope.args(),
        default_project: config.default_project().map(str::to_string),
        ..Default::default()
    };

    match add_memory(db, content, &opts)? {
        AddOutcome::Created(m) => println!("Stored {} {} in {}", m.memory_type, m.id, m.scope),
        AddOutcome::Duplicate(m) => println!("Already stored as {} in {}", m.id, m.scope),
    }
    Ok(())
}

/// What `cairn forget` should act on.
pub enum ForgetTarget {
    Ids(Vec<String>),
    Filter {
        memory_type: Option<String>,
        tags: Vec<String>,
        contains: Option<String>,
        scope: ScopeFlags,
        dry_run: bool,
    },
}

/// Forget memories by id, or everything matching a filter.
pub fn forget(db: &dyn Database, target: ForgetTarget) -> Result<()> {
    match target {
        ForgetTarget::Ids(ids) if ids.len() == 1 => {
            if forget_one(db, &ids[0])? {
                println!("Forgot {}", ids[0]);
            } else {
                println!("No active memory with id {}", ids[0]);
            }
        }
        ForgetTarget::Ids(ids) => {
            let count = bulk_forget_by_ids(db, &ids)?;
            println!("Forgot {count} of {} memories.", ids.len());
        }
        ForgetTarget::Filter {
            memory_type,
            tags,
            contains,
            scope,
            dry_run,
        } => {
            let filter = ForgetFilter {
                types: memory_type
                    .as_deref()
                    .map(str::parse::<MemoryType>)
                    .transpose()?
                    .into_iter()
                    .collect(),
                tags,
                scope: match resolve_scope(&scope.args())? {
                    ScopeIntent::Unscoped => ScopeFilter::All,
                    ScopeIntent::Global => ScopeFilter::GlobalOnly,
                    ScopeIntent::Project(id) => ScopeFilter::Project(id),
                },
                content_contains: contains,
                limit: None,
            };
            anyhow::ensure!(
                !filter.is_unrestricted(),
                "give one or more ids, or at least one of --type, --tag, --contains"
            );

            let candidates = find_to_forget(db, &filter)?;
            if dry_run {
                println!(
                    "{} memories match (dry run, nothing forgotten):\n",
                    candidates.len()
                );
                print_memories(&candidates, "Nothing matches.");
                return Ok(());
            }
            let ids: Vec<String> = candidates.into_iter().map(|m| m.id).collect();
            let count = bulk_forget_by_ids(db, &ids)?;
            println!("Forgot {count} memories.");
        }
    }
    Ok(())
}
