//! One full synchronization run across every configured source.
//!
//! Sources are reconciled strictly in configuration order, one at a time;
//! their contributions are concatenated in that same order, so the run
//! result is a sequence of contiguous per-source blocks, each oldest-first.
//! The combined batch then goes through the enrichment fan-out, and only
//! after every enricher has finished does the run persist anything. A
//! non-empty batch lands as one transactional bulk insert; an empty batch
//! touches nothing.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument};

use newssync_fetch::PipelineRegistry;
use newssync_shared::{AppConfig, NewsItem, Result, SyncConfig};
use newssync_storage::Storage;

use crate::enrich::{Enricher, run_enrichers};
use crate::reconcile::reconcile_source;

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Per-source slice of a run report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceReport {
    pub title: String,
    pub new_items: usize,
}

/// Summary of one synchronization run.
#[derive(Debug)]
pub struct SyncReport {
    /// Run row id in storage.
    pub run_id: String,
    /// New items across all sources, in the order they were persisted.
    pub new_items: Vec<NewsItem>,
    /// Per-source counts, in configuration order.
    pub sources: Vec<SourceReport>,
    /// Wall-clock duration of the run.
    pub elapsed: std::time::Duration,
}

impl SyncReport {
    fn stats_json(&self) -> String {
        serde_json::json!({
            "new_items": self.new_items.len(),
            "sources": self.sources,
            "elapsed_ms": self.elapsed.as_millis() as u64,
        })
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Run one synchronization pass: reconcile, enrich, persist.
///
/// Any failure aborts the run before the persistence step; the store is
/// never left with a partial batch.
#[instrument(skip_all, fields(sources = config.sources.len()))]
pub async fn run_sync(
    config: &AppConfig,
    registry: &PipelineRegistry,
    storage: &Storage,
    enrichers: &[Arc<dyn Enricher>],
) -> Result<SyncReport> {
    let start = Instant::now();
    let sync = SyncConfig::from(config);
    let run_id = storage.insert_sync_run().await?;

    // --- Reconcile each source, in declaration order ---
    let mut new_items: Vec<NewsItem> = Vec::new();
    let mut sources = Vec::with_capacity(config.sources.len());

    for source in &config.sources {
        let pipeline = registry.get(&source.title)?;
        let last_known = storage.latest_item(&source.title).await?;

        let found =
            reconcile_source(pipeline.as_ref(), source, last_known.as_ref(), &sync).await?;

        info!(source = %source.title, new_items = found.len(), "source reconciled");
        sources.push(SourceReport {
            title: source.title.clone(),
            new_items: found.len(),
        });
        new_items.extend(found);
    }

    // --- Enrichment fan-out, before anything is persisted ---
    let batch = Arc::new(new_items);
    run_enrichers(enrichers, Arc::clone(&batch)).await?;

    // --- Persistence gate ---
    if !batch.is_empty() {
        storage.bulk_insert(&batch).await?;
    }

    let report = SyncReport {
        run_id,
        new_items: Arc::try_unwrap(batch).unwrap_or_else(|arc| (*arc).clone()),
        sources,
        elapsed: start.elapsed(),
    };

    storage
        .finish_sync_run(&report.run_id, &report.stats_json())
        .await?;

    info!(
        run_id = %report.run_id,
        new_items = report.new_items.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "sync run finished"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
