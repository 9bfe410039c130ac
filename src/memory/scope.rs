//! Scope resolution.
//!
//! Callers express scope as `{global?, project_id?}`. [`resolve_scope`] turns
//! that into a [`ScopeIntent`] and rejects the contradictory combination. Writes
//! then pick a concrete [`Scope`]; reads pick a [`ScopeFilter`].

use serde::Deserialize;

use crate::error::{MemoryError, Result};
use crate::memory::types::Scope;

/// Raw scope arguments as they arrive from a tool call or CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScopeArgs {
    pub global: Option<bool>,
    pub project_id: Option<String>,
}

impl ScopeArgs {
    pub fn new(global: Option<bool>, project_id: Option<String>) -> Self {
        Self { global, project_id }
    }
}

/// Arguments that name exactly `scope`.
impl From<&Scope> for ScopeArgs {
    fn from(scope: &Scope) -> Self {
        match scope {
            Scope::Global => Self::new(Some(true), None),
            Scope::Project(id) => Self::new(None, Some(id.clone())),
        }
    }
}

/// What the caller asked for, before any default is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeIntent {
    Unscoped,
    Global,
    Project(String),
}

/// Validate scope arguments.
///
/// A blank or whitespace-only project id counts as absent.
pub fn resolve_scope(args: &ScopeArgs) -> Result<ScopeIntent> {
    let global = args.global.unwrap_or(false);
    let project = args
        .project_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    match (global, project) {
        (true, Some(_)) => Err(MemoryError::validation(
            "cannot set both global and project scope; choose one",
        )),
        (true, None) => Ok(ScopeIntent::Global),
        (false, Some(p)) => Ok(ScopeIntent::Project(p.to_string())),
        (false, None) => Ok(ScopeIntent::Unscoped),
    }
}

impl ScopeIntent {
    /// Scope for a write: unscoped means the default project if there is one,
    /// otherwise global.
    pub fn write_scope(&self, default_project: Option<&str>) -> Scope {
        match self {
            Self::Global => Scope::Global,
            Self::Project(id) => Scope::Project(id.clone()),
            Self::Unscoped => match default_project.map(str::trim).filter(|p| !p.is_empty()) {
                Some(p) => Scope::Project(p.to_string()),
                None => Scope::Global,
            },
        }
    }

    /// Filter for a read. A project sees its own memories plus global ones;
    /// an unscoped read without a default project sees only global memories.
    pub fn read_filter(&self, default_project: Option<&str>) -> ScopeFilter {
        match self.write_scope(default_project) {
            Scope::Global => ScopeFilter::GlobalOnly,
            Scope::Project(id) => ScopeFilter::ProjectAndGlobal(id),
        }
    }
}

/// Which scopes a read may see.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScopeFilter {
    /// Every scope. Maintenance and export only.
    #[default]
    All,
    GlobalOnly,
    /// One project, excluding global memories.
    Project(String),
    ProjectAndGlobal(String),
}

impl ScopeFilter {
    /// The exact stored scope for a filter that names one.
    pub fn exact(scope: &Scope) -> Self {
        match scope {
            Scope::Global => Self::GlobalOnly,
            Scope::Project(id) => Self::Project(id.clone()),
        }
    }
}
