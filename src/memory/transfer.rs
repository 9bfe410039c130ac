//! JSON export and import.
//!
//! The boundary format is `{version: "1.0", memories: [{id?, content, type?,
//! tags?, scope?}]}`. Imports go through [`add`], so validation and dedup
//! against stored rows apply exactly as for any other write; duplicates inside
//! one import batch are dropped first using the same normalization.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{MemoryError, Result};
use crate::memory::scope::{resolve_scope, ScopeArgs, ScopeFilter, ScopeIntent};
use crate::memory::search::{list, ListFilter};
use crate::memory::store::{add, AddOptions, AddOutcome};
use crate::memory::types::{normalize_content, Memory, MemoryType, Scope};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    pub version: String,
    pub memories: Vec<ExportEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// `global` or `project:<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

impl From<Memory> for ExportEntry {
    fn from(m: Memory) -> Self {
        Self {
            id: Some(m.id),
            content: m.content,
            memory_type: Some(m.memory_type.to_string()),
            tags: m.tags,
            scope: Some(m.scope.to_string()),
            category: m.category,
            paths: m.paths,
        }
    }
}

/// Export live memories visible through `scope`, oldest first.
pub fn export_memories(db: &dyn Database, scope: &ScopeFilter) -> Result<ExportData> {
    let mut memories = list(
        db,
        &ListFilter {
            scope: scope.clone(),
            ..Default::default()
        },
    )?;
    memories.reverse();

    tracing::info!(count = memories.len(), "exported memories");
    Ok(ExportData {
        version: EXPORT_VERSION.to_string(),
        memories: memories.into_iter().map(ExportEntry::from).collect(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// When set, overrides every entry's own scope.
    pub scope: ScopeArgs,
    /// Applies to entries with no scope of their own.
    pub default_project: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRejection {
    /// Position in the input `memories` array.
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Already stored, or repeated earlier in the same batch.
    pub duplicates: usize,
    pub rejected: Vec<ImportRejection>,
}

/// Import `data` through [`add`]. Invalid entries are rejected individually;
/// a storage failure aborts the import.
pub fn import_memories(
    db: &dyn Database,
    data: &ExportData,
    opts: &ImportOptions,
) -> Result<ImportReport> {
    if data.version != EXPORT_VERSION {
        return Err(MemoryError::validation(format!(
            "unsupported export version {:?} (expected {EXPORT_VERSION})",
            data.version
        )));
    }
    let override_intent = resolve_scope(&opts.scope)?;

    let mut report = ImportReport::default();
    let mut seen: HashSet<(Scope, String)> = HashSet::new();

    for (index, entry) in data.memories.iter().enumerate() {
        let add_opts = match entry_options(entry, &override_intent, opts) {
            Ok(add_opts) => add_opts,
            Err(e) if e.is_validation() => {
                report.rejected.push(ImportRejection {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        let scope = resolve_scope(&add_opts.scope)?.write_scope(opts.default_project.as_deref());
        if !seen.insert((scope, normalize_content(&entry.content))) {
            report.duplicates += 1;
            continue;
        }

        match add(db, &entry.content, &add_opts) {
            Ok(AddOutcome::Created(_)) => report.imported += 1,
            Ok(AddOutcome::Duplicate(_)) => report.duplicates += 1,
            Err(e) if e.is_validation() => report.rejected.push(ImportRejection {
                index,
                reason: e.to_string(),
            }),
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        imported = report.imported,
        duplicates = report.duplicates,
        rejected = report.rejected.len(),
        "import finished"
    );
    Ok(report)
}

fn entry_options(
    entry: &ExportEntry,
    override_intent: &ScopeIntent,
    opts: &ImportOptions,
) -> Result<AddOptions> {
    if entry.content.trim().is_empty() {
        return Err(MemoryError::validation("content must not be empty"));
    }
    let memory_type = entry
        .memory_type
        .as_deref()
        .map(str::parse::<MemoryType>)
        .transpose()?;

    let scope = match (override_intent, entry.scope.as_deref()) {
        (ScopeIntent::Unscoped, Some(s)) => ScopeArgs::from(&s.parse::<Scope>()?),
        _ => opts.scope.clone(),
    };

    Ok(AddOptions {
        memory_type,
        tags: entry.tags.clone(),
        paths: entry.paths.clone(),
        category: entry.category.clone(),
        scope,
        default_project: opts.default_project.clone(),
    })
}
