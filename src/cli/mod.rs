pub mod doctor;
pub mod embed;
pub mod export;
pub mod import;
pub mod inject;
pub mod inspect;
pub mod maintenance;
pub mod search;
pub mod stats;
pub mod write;

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;

use crate::config::CairnConfig;
use crate::db::target::{resolve_target, CallerIdentity, StaticCredentials};
use crate::db::{self, Database};
use crate::memory::{resolve_scope, Memory, ScopeArgs, ScopeFilter};

/// `--global` / `--project` flags shared by every command that touches scope.
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeFlags {
    /// Global scope, visible to every project
    #[arg(long)]
    pub global: bool,

    /// Project scope (reads also include global memories)
    #[arg(long, value_name = "ID")]
    pub project: Option<String>,
}

impl ScopeFlags {
    pub fn args(&self) -> ScopeArgs {
        ScopeArgs::new(self.global.then_some(true), self.project.clone())
    }

    /// Read filter, defaulting to the configured project.
    pub fn read_filter(&self, config: &CairnConfig) -> Result<ScopeFilter> {
        let intent = resolve_scope(&self.args())?;
        Ok(intent.read_filter(config.default_project()))
    }
}

/// Open the store for this process, or for a bearer credential's replica.
pub fn open_store(config: &CairnConfig, bearer: Option<&str>) -> Result<Arc<dyn Database>> {
    let identity = match bearer {
        Some(b) => CallerIdentity::Bearer(b.to_string()),
        None => CallerIdentity::Local,
    };
    let credentials = StaticCredentials::from_config(&config.storage);
    let target = resolve_target(&identity, &config.storage, &credentials)?;
    db::open_database(&target).context("failed to open database")
}

/// One-line summary used by listing commands.
pub(crate) fn summary_line(memory: &Memory) -> String {
    let preview: String = memory.content.chars().take(120).collect();
    let ellipsis = if memory.content.chars().count() > 120 { "..." } else { "" };
    let mut line = format!(
        "[{}] {} ({})\n     {preview}{ellipsis}",
        memory.memory_type, memory.id, memory.scope
    );
    if !memory.tags.is_empty() {
        line.push_str(&format!("\n     tags: {}", memory.tags.join(", ")));
    }
    line
}

pub(crate) fn print_memories(memories: &[Memory], empty: &str) {
    if memories.is_empty() {
        println!("{empty}");
        return;
    }
    for (i, memory) in memories.iter().enumerate() {
        println!("  {}. {}", i + 1, summary_line(memory));
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{MemoryType, Scope};

    fn memory(content: &str) -> Memory {
        Memory {
            id: "0190".into(),
            content: content.into(),
            memory_type: MemoryType::Fact,
            scope: Scope::Project("web".into()),
            tags: vec!["a".into(), "b".into()],
            category: None,
            paths: Vec::new(),
            has_embedding: false,
            created_at: "2025-01-01T00:00:00.000000Z".into(),
            updated_at: "2025-01-01T00:00:00.000000Z".into(),
        }
    }

    #[test]
    fn summary_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        let line = summary_line(&memory(&long));
        assert!(line.starts_with("[fact] 0190 (project:web)"));
        assert!(line.contains("..."));
        assert!(line.ends_with("tags: a, b"));
    }

    #[test]
    fn scope_flags_conflict_is_rejected() {
        let flags = ScopeFlags {
            global: true,
            project: Some("web".into()),
        };
        assert!(flags.read_filter(&CairnConfig::default()).is_err());
    }

    #[test]
    fn bearer_without_credentials_is_unauthorized() {
        let err = open_store(&CairnConfig::default(), Some("who")).err().unwrap();
        assert!(err.to_string().contains("unauthorized"));
    }
}
