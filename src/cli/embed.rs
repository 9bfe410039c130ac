//! CLI `embed` command: backfill embeddings through the configured provider.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::CairnConfig;
use crate::db::Database;
use crate::embedding;
use crate::memory::embeddings::{backfill, find_pending, BackfillOptions};

/// Embed pending memories, or every live memory with `all`.
pub fn embed(db: &dyn Database, config: &CairnConfig, all: bool) -> Result<()> {
    let provider =
        embedding::create_provider(&config.embedding).context("failed to create embedding provider")?;

    let total = find_pending(db, all)?.len();
    if total == 0 {
        println!("No memories need embedding.");
        return Ok(());
    }

    println!("Embedding {total} memories with model '{}'...", config.embedding.model);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .context("invalid progress template")?
            .progress_chars("##-"),
    );

    let opts = BackfillOptions {
        batch_size: config.embedding.batch_size,
        all,
    };
    let report = backfill(db, provider.as_ref(), &opts, |progress| {
        pb.set_position((progress.embedded + progress.skipped) as u64);
    });
    pb.finish_and_clear();
    let report = report.context("embedding backfill failed")?;

    println!(
        "Embedded {} memories with model '{}'.",
        report.embedded,
        provider.model_name()
    );
    if report.skipped > 0 {
        println!("Skipped {} forgotten while embedding.", report.skipped);
    }
    Ok(())
}
