//! The ingestion pipeline: per-item stages and the run orchestrator.
//!
//! One run walks every fetch-enabled source in name order, pulls its
//! feed, and pushes each raw item through normalize → rules → classify →
//! dedup/insert. Sources fail independently; the recount pass and the
//! optional cache purge run once at the end of the batch.

pub mod classify;
pub mod normalize;
pub mod recount;
pub mod rules;

pub use classify::{classify, compile_categories, CompiledCategory};
pub use normalize::{normalize_item, NormalizedItem};
pub use rules::RuleSet;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::cache::PageCache;
use crate::config::Config;
use crate::feed::{self, FetchLimits};
use crate::storage::{Database, Source};

/// Caller-supplied knobs for one run.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Only process the source with this exact name.
    pub source_filter: Option<String>,
    /// Append `&from=<value>` to every feed URL (test harness hook).
    pub from_suffix: Option<String>,
    /// Ignore the minimum interval between runs.
    pub force: bool,
}

/// Everything one ingestion run needs, owned in one place: the shared
/// database handle, the per-run snapshots of categories and rules, the
/// HTTP client and the run options. Passed by reference through every
/// stage — there is no global state.
pub struct PipelineContext {
    pub db: Database,
    client: reqwest::Client,
    categories: Vec<CompiledCategory>,
    rules: RuleSet,
    cache: Option<PageCache>,
    fetch: FetchLimits,
    min_interval: Duration,
    options: RunOptions,
}

impl PipelineContext {
    /// Snapshot categories and rules and assemble the run context.
    pub async fn prepare(
        db: Database,
        client: reqwest::Client,
        config: &Config,
        options: RunOptions,
    ) -> Result<Self> {
        let categories =
            compile_categories(&db.categories().await.context("loading categories")?);
        let rules = RuleSet::compile(&db.rules().await.context("loading rules")?);
        tracing::debug!(
            categories = categories.len(),
            rules = rules.len(),
            "pipeline snapshots loaded"
        );
        let cache = config
            .page_cache_enabled
            .then(|| PageCache::new(&config.page_cache_dir));

        Ok(Self {
            db,
            client,
            categories,
            rules,
            cache,
            fetch: FetchLimits {
                timeout: Duration::from_secs(config.fetch_timeout_secs),
                max_bytes: config.max_feed_size_bytes,
            },
            min_interval: Duration::from_secs(config.min_fetch_interval_minutes * 60),
            options,
        })
    }
}

/// Drive one ingestion run across all fetch-enabled sources.
///
/// Returns the total number of newly inserted items. A single source
/// failure is never fatal; only the inability to reach the store at all
/// surfaces as an error.
pub async fn run_ingest(ctx: &PipelineContext) -> Result<usize> {
    let now = Utc::now().timestamp();
    if !ctx.options.force && ctx.min_interval.as_secs() > 0 {
        if let Some(last) = ctx.db.last_run_at().await.context("reading last run time")? {
            let elapsed = now - last;
            if elapsed >= 0 && (elapsed as u64) < ctx.min_interval.as_secs() {
                tracing::debug!(elapsed, "previous run too recent, skipping");
                return Ok(0);
            }
        }
    }
    ctx.db.set_last_run_at(now).await.context("recording run time")?;

    let sources = ctx.db.sources_to_fetch().await.context("loading sources")?;
    tracing::info!(sources = sources.len(), "ingestion run started");

    let mut total_added = 0;
    for source in &sources {
        if let Some(filter) = &ctx.options.source_filter {
            if filter != &source.name {
                continue;
            }
        }
        if source.feed_url.is_empty() {
            tracing::debug!(source = %source.name, "source has no feed URL, skipping");
            continue;
        }
        match ingest_source(ctx, source).await {
            Ok(added) => {
                tracing::info!(source = %source.name, added, "source processed");
                total_added += added;
            }
            Err(e) => {
                tracing::warn!(source = %source.name, error = %e, "source failed, continuing");
            }
        }
    }

    if let Err(e) = recount::recount(&ctx.db, &ctx.categories).await {
        // Nothing was marked counted, so the next run picks the same
        // items up again
        tracing::error!(error = %e, "recount pass failed");
    }

    if total_added > 0 {
        if let Some(cache) = &ctx.cache {
            cache.purge();
        }
    }

    tracing::info!(added = total_added, "ingestion run finished");
    Ok(total_added)
}

/// Fetch, parse and ingest a single source. Any error here means "zero
/// items from this source" for the current run.
async fn ingest_source(ctx: &PipelineContext, source: &Source) -> Result<usize> {
    let mut url = source.feed_url.clone();
    if let Some(suffix) = &ctx.options.from_suffix {
        url.push_str("&from=");
        url.push_str(suffix);
    }

    let body = feed::fetch_text(&ctx.client, &url, &ctx.fetch).await?;
    let raw_items = feed::parse_feed(&body)?;
    tracing::debug!(source = %source.name, items = raw_items.len(), "feed parsed");

    let mut added = 0;
    // Feeds list newest entries first; walking back-to-front makes
    // insertion order match chronological publish order
    for raw in raw_items.iter().rev() {
        let mut item = normalize_item(raw);
        if item.link.is_empty() {
            // Expected noise in feed data, not an error
            continue;
        }

        let rules_applied = ctx.rules.apply(&source.name, &mut item, raw);
        let tags_added = classify(&mut item, &ctx.categories);
        tracing::trace!(link = %item.link, rules_applied, tags_added, "item processed");

        if ctx.db.item_exists(source.id, &item.link).await? {
            continue;
        }
        let fetched_at = Utc::now().timestamp();
        let new_item = item.into_new_item(fetched_at);
        match ctx.db.insert_item(source.id, &new_item, fetched_at).await {
            Ok(_) => added += 1,
            Err(e) => {
                // Counted as not-added; the batch carries on
                tracing::warn!(link = %new_item.link, error = %e, "item insert failed");
            }
        }
    }

    Ok(added)
}
