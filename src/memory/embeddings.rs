//! Embedding backfill.
//!
//! [`find_pending`] and [`assign`] are the two store primitives; [`backfill`]
//! drives them in batches through an [`EmbeddingProvider`]. Nothing is kept
//! between batches, so an interrupted run simply resumes on the next call.

use serde::Serialize;

use crate::db::migrations::set_embedding_model;
use crate::db::{Database, Statement};
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::memory::query::ActiveQuery;
use crate::memory::types::embedding_to_bytes;

/// A live memory that needs (or is getting) a vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEmbedding {
    pub id: String,
    pub content: String,
}

/// Live memories without an embedding, oldest first. With `all`, every live
/// memory regardless of embedding state.
pub fn find_pending(db: &dyn Database, all: bool) -> Result<Vec<PendingEmbedding>> {
    let mut query = ActiveQuery::new();
    if !all {
        query = query.pending_embedding();
    }
    let mut pending: Vec<PendingEmbedding> = query
        .fetch(db)?
        .into_iter()
        .map(|m| PendingEmbedding {
            id: m.id,
            content: m.content,
        })
        .collect();
    pending.reverse();
    Ok(pending)
}

/// Store `vector` for a live memory. Leaves `updated_at` alone.
///
/// Returns `false` if the memory is missing or soft-deleted.
pub fn assign(db: &dyn Database, id: &str, vector: &[f32]) -> Result<bool> {
    if vector.is_empty() {
        return Err(MemoryError::validation("embedding vector must not be empty"));
    }
    let result = db.execute(
        &Statement::new("UPDATE memories SET embedding = ?1 WHERE id = ?2 AND deleted_at IS NULL")
            .bind(embedding_to_bytes(vector))
            .bind(id.to_string()),
    )?;
    Ok(result.rows_affected == 1)
}

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    pub batch_size: usize,
    /// Re-embed every live memory, not just pending ones.
    pub all: bool,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            all: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillReport {
    pub candidates: usize,
    pub embedded: usize,
    /// Rows forgotten between the scan and the write.
    pub skipped: usize,
    pub batches: usize,
}

/// Embed pending memories batch by batch, reporting progress after each batch.
///
/// A provider failure aborts the run; batches already written stay written.
pub fn backfill(
    db: &dyn Database,
    provider: &dyn EmbeddingProvider,
    opts: &BackfillOptions,
    mut on_batch: impl FnMut(&BackfillReport),
) -> Result<BackfillReport> {
    let pending = find_pending(db, opts.all)?;
    let mut report = BackfillReport {
        candidates: pending.len(),
        ..Default::default()
    };
    if pending.is_empty() {
        tracing::info!("no memories pending embedding");
        return Ok(report);
    }

    tracing::info!(
        candidates = pending.len(),
        model = provider.model_name(),
        "starting embedding backfill"
    );

    for chunk in pending.chunks(opts.batch_size.max(1)) {
        let texts: Vec<&str> = chunk.iter().map(|p| p.content.as_str()).collect();
        let vectors = provider.embed_batch(&texts)?;
        if vectors.len() != chunk.len() {
            return Err(MemoryError::Embedding(format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                chunk.len()
            )));
        }

        for (item, vector) in chunk.iter().zip(&vectors) {
            if assign(db, &item.id, vector)? {
                report.embedded += 1;
            } else {
                report.skipped += 1;
            }
        }
        report.batches += 1;
        tracing::debug!(batch = report.batches, embedded = report.embedded, "embedding batch done");
        on_batch(&report);
    }

    set_embedding_model(db, provider.model_name())?;
    tracing::info!(
        embedded = report.embedded,
        skipped = report.skipped,
        "embedding backfill complete"
    );
    Ok(report)
}
