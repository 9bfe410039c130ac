//! CLI `vacuum` command.

use anyhow::Result;

use crate::db::Database;
use crate::memory::forget::vacuum as purge;

/// Purge soft-deleted memories older than `older_than_days`.
pub fn vacuum(db: &dyn Database, older_than_days: u32) -> Result<()> {
    let report = purge(db, older_than_days)?;

    if report.purged == 0 {
        println!("No forgotten memories older than {older_than_days} day(s).");
    } else {
        println!(
            "Purged {} forgotten memories older than {} day(s).",
            report.purged, report.older_than_days
        );
    }
    Ok(())
}
