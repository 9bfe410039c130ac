//! Storage health checks and the advisory warnings they produce.
//!
//! Three independent checks each yield at most one [`StorageWarning`]: the
//! store's own integrity check, full-text index parity, and soft-delete backlog.
//! Warnings are advisory. A check that cannot run is logged and skipped, and
//! [`append_warnings`] only ever decorates successful, non-empty responses.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::{HealthConfig, IntegrityMode};
use crate::db::{Database, DbError, Statement};

pub const INTEGRITY_CHECK_FAILED: &str = "INTEGRITY_CHECK_FAILED";
pub const FTS_INDEX_DRIFT: &str = "FTS_INDEX_DRIFT";
pub const SOFT_DELETED_BACKLOG: &str = "SOFT_DELETED_BACKLOG";

/// How seriously a warning should be taken. Neither level fails a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The store itself reports damage; stop writing and restore.
    Fatal,
    Advisory,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => f.write_str("fatal"),
            Self::Advisory => f.write_str("advisory"),
        }
    }
}

/// One finding. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageWarning {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    /// Suggested actions, most useful first.
    pub remediation: Vec<String>,
}

/// Run every check. Never fails; unrunnable checks are skipped.
pub fn check_storage_health(db: &dyn Database, config: &HealthConfig) -> Vec<StorageWarning> {
    let checks: [(&str, fn(&dyn Database, &HealthConfig) -> Result<Option<StorageWarning>, DbError>); 3] = [
        ("integrity", check_integrity),
        ("fts_parity", check_fts_parity),
        ("soft_delete_backlog", check_backlog),
    ];

    let mut warnings = Vec::new();
    for (name, check) in checks {
        match check(db, config) {
            Ok(Some(warning)) => {
                tracing::warn!(check = name, code = warning.code, "{}", warning.message);
                warnings.push(warning);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(check = name, error = %e, "health check could not run"),
        }
    }
    warnings
}

fn check_integrity(
    db: &dyn Database,
    config: &HealthConfig,
) -> Result<Option<StorageWarning>, DbError> {
    let pragma = match config.integrity_mode {
        IntegrityMode::Quick => "PRAGMA quick_check",
        IntegrityMode::Full => "PRAGMA integrity_check",
    };
    let result = db.execute(&Statement::new(pragma))?;
    let problems: Vec<String> = result
        .rows
        .iter()
        .filter_map(|row| row.opt_text(0).ok().flatten())
        .filter(|line| line != "ok")
        .collect();

    if problems.is_empty() {
        return Ok(None);
    }
    let shown: Vec<&str> = problems.iter().take(3).map(String::as_str).collect();
    Ok(Some(StorageWarning {
        code: INTEGRITY_CHECK_FAILED,
        severity: Severity::Fatal,
        message: format!(
            "database integrity check reported {} problem(s): {}",
            problems.len(),
            shown.join("; ")
        ),
        remediation: vec![
            "cairn export --output backup.json".into(),
            "restore the database file from a known-good backup".into(),
        ],
    }))
}

fn check_fts_parity(
    db: &dyn Database,
    _config: &HealthConfig,
) -> Result<Option<StorageWarning>, DbError> {
    let result = db.execute(&Statement::new(
        "SELECT (SELECT COUNT(*) FROM memories_fts), \
                (SELECT COUNT(*) FROM memories WHERE deleted_at IS NULL)",
    ))?;
    let row = result
        .first()
        .ok_or_else(|| DbError::Decode("parity query returned no row".into()))?;
    let indexed = row.integer(0)?;
    let active = row.integer(1)?;

    if indexed == active {
        return Ok(None);
    }
    Ok(Some(StorageWarning {
        code: FTS_INDEX_DRIFT,
        severity: Severity::Advisory,
        message: format!(
            "full-text index has {indexed} entries but there are {active} active memories; search results may be incomplete"
        ),
        remediation: vec!["cairn doctor --repair".into()],
    }))
}

fn check_backlog(
    db: &dyn Database,
    config: &HealthConfig,
) -> Result<Option<StorageWarning>, DbError> {
    let result = db.execute(&Statement::new(
        "SELECT COUNT(*), COALESCE(SUM(deleted_at IS NOT NULL), 0) FROM memories",
    ))?;
    let row = result
        .first()
        .ok_or_else(|| DbError::Decode("backlog query returned no row".into()))?;
    let total = row.integer(0)? as u64;
    let deleted = row.integer(1)? as u64;

    Ok(backlog_warning(deleted, total, config))
}

/// Pure threshold rule behind the backlog check.
pub fn backlog_warning(deleted: u64, total: u64, config: &HealthConfig) -> Option<StorageWarning> {
    if total == 0 || deleted < config.backlog_min_deleted {
        return None;
    }
    let ratio = deleted as f64 / total as f64;
    if ratio < config.backlog_ratio {
        return None;
    }
    Some(StorageWarning {
        code: SOFT_DELETED_BACKLOG,
        severity: Severity::Advisory,
        message: format!(
            "{deleted} of {total} stored memories ({:.0}%) are soft-deleted",
            ratio * 100.0
        ),
        remediation: vec![
            format!("cairn vacuum --older-than-days {}", config.vacuum_age_days),
            "cairn vacuum --older-than-days 0".into(),
        ],
    })
}

/// Render warnings as the block appended to tool responses.
pub fn format_warnings(warnings: &[StorageWarning]) -> String {
    let mut out = String::from("Storage warning:");
    for warning in warnings {
        match warning.severity {
            Severity::Fatal => out.push_str(&format!(
                "\n- [{}] ({}) {}",
                warning.code, warning.severity, warning.message
            )),
            Severity::Advisory => {
                out.push_str(&format!("\n- [{}] {}", warning.code, warning.message))
            }
        }
        for step in &warning.remediation {
            out.push_str(&format!("\n  - {step}"));
        }
    }
    out
}

/// Decorate a response with warnings.
///
/// Only a successful, non-empty response is touched. Errors and empty payloads
/// pass through unchanged.
pub fn append_warnings<E>(
    response: Result<String, E>,
    warnings: &[StorageWarning],
) -> Result<String, E> {
    match response {
        Ok(text) if !text.trim().is_empty() && !warnings.is_empty() => {
            Ok(format!("{text}\n\n{}", format_warnings(warnings)))
        }
        other => other,
    }
}

/// Caches health results so tool calls do not re-run the checks every time.
///
/// The lock covers only the cache itself; checks run with it released, so a
/// slow store never holds up other callers.
pub struct HealthMonitor {
    config: HealthConfig,
    cache: Mutex<HealthCache>,
}

#[derive(Default)]
struct HealthCache {
    /// Bumped by `invalidate`, so a check started before it cannot refill.
    generation: u64,
    entry: Option<(Instant, Vec<StorageWarning>)>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HealthCache::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HealthCache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Current warnings, re-checked once `refresh_secs` have passed.
    pub fn warnings(&self, db: &dyn Database) -> Vec<StorageWarning> {
        if !self.config.enabled {
            return Vec::new();
        }
        let ttl = Duration::from_secs(self.config.refresh_secs);
        let generation = {
            let cache = self.lock();
            if let Some((at, warnings)) = cache.entry.as_ref() {
                if at.elapsed() < ttl {
                    return warnings.clone();
                }
            }
            cache.generation
        };

        let warnings = check_storage_health(db, &self.config);

        let mut cache = self.lock();
        if cache.generation == generation {
            cache.entry = Some((Instant::now(), warnings.clone()));
        }
        warnings
    }

    /// Drop the cached result, e.g. after a repair.
    pub fn invalidate(&self) {
        let mut cache = self.lock();
        cache.generation += 1;
        cache.entry = None;
    }
}
