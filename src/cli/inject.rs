//! CLI `inject` command: prompt middleware over stdin/stdout.

use anyhow::{Context, Result};
use std::io::{Read, Write};

use crate::config::CairnConfig;
use crate::db::Database;
use crate::memory::search::ContextOptions;
use crate::prompt::inject_context;

use super::ScopeFlags;

/// Read a JSON request envelope from stdin, inject recalled memory into its
/// `system` field, and write the result to stdout.
pub fn inject(db: &dyn Database, config: &CairnConfig, scope: &ScopeFlags) -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read envelope from stdin")?;
    let envelope: serde_json::Value =
        serde_json::from_str(&input).context("stdin is not valid JSON")?;

    let opts = ContextOptions {
        limit: config.retrieval.context_limit,
        scope: scope.read_filter(config)?,
    };
    let out = inject_context(db, envelope, &opts)?;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &out)?;
    writeln!(stdout)?;
    Ok(())
}
