//! feedmill — an RSS ingestion pipeline.
//!
//! The pipeline fetches every fetch-enabled source, parses its RSS 2.0
//! feed into raw field maps, cleans each entry, rewrites it through an
//! ordered per-source rule chain, tags it against regex category filters,
//! and persists only genuinely new items. A batch-end recount pass keeps
//! per-category counters consistent across repeated runs.
//!
//! Module layout:
//!
//! - [`feed`] — HTTP fetching and RSS parsing into raw item maps
//! - [`ingest`] — normalizer, rule engine, classifier, recount, orchestrator
//! - [`storage`] — SQLite persistence (sources, categories, rules, items)
//! - [`cache`] — rendered-page cache invalidation
//! - [`config`] — optional TOML configuration

pub mod cache;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod storage;
pub mod util;
