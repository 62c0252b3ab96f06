//! Batch-end category counter reconciliation.
//!
//! The recount pass runs exactly once per ingestion run, after every
//! source has been processed. It folds all not-yet-counted items into
//! the category counters and then marks them counted in one step, so no
//! item is ever counted twice across runs.

use anyhow::{Context, Result};

use super::classify::CompiledCategory;
use crate::storage::Database;

/// Reconcile category counters with the uncounted items.
///
/// Counter increments happen first; only when every increment has
/// succeeded are the items marked counted. On a failed increment the
/// whole batch stays uncounted, so the next run retries it rather than
/// losing counts. Items that match no category are marked counted too —
/// they would otherwise be re-scanned forever.
pub async fn recount(db: &Database, categories: &[CompiledCategory]) -> Result<()> {
    let uncounted = db.uncounted_items().await.context("loading uncounted items")?;
    if uncounted.is_empty() {
        tracing::debug!("recount: nothing to do");
        return Ok(());
    }

    for category in categories {
        let delta = uncounted
            .iter()
            .filter(|item| {
                category.matches_category_field(item.category.as_deref().unwrap_or(""))
            })
            .count() as i64;
        if delta > 0 {
            db.increment_category_counter(category.id, delta)
                .await
                .with_context(|| format!("incrementing counter for '{}'", category.name))?;
            tracing::debug!(category = %category.name, delta, "category counter updated");
        }
    }

    let ids: Vec<i64> = uncounted.iter().map(|item| item.id).collect();
    db.mark_items_counted(&ids)
        .await
        .context("marking items counted")?;
    tracing::info!(items = ids.len(), "recount pass complete");

    Ok(())
}
