//! Enrichment fan-out for freshly reconciled items.
//!
//! Enrichers are independent observers of a run's new items: each one gets
//! the same immutable snapshot and runs on its own spawned task. The run
//! joins every task before reporting anything, so one failing enricher never
//! cancels the others; the first failure is surfaced once all have finished.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use newssync_shared::{NewsItem, NewsSyncError, Result};

// ---------------------------------------------------------------------------
// Enricher trait
// ---------------------------------------------------------------------------

/// A processor notified with the batch of new items from one sync run.
///
/// Implementations must tolerate an empty batch; the fan-out runs on every
/// sync, including ones that found nothing.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Process one batch of new items.
    async fn process(&self, items: Arc<Vec<NewsItem>>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Run every enricher concurrently over the same snapshot and wait for all
/// of them.
///
/// All tasks are joined before any error is returned. When several fail,
/// each failure is logged and the first (in registration order) is returned.
#[instrument(skip_all, fields(enrichers = enrichers.len(), items = items.len()))]
pub async fn run_enrichers(
    enrichers: &[Arc<dyn Enricher>],
    items: Arc<Vec<NewsItem>>,
) -> Result<()> {
    let mut handles = Vec::with_capacity(enrichers.len());
    for enricher in enrichers {
        let enricher = Arc::clone(enricher);
        let batch = Arc::clone(&items);
        let name = enricher.name().to_string();
        handles.push((name, tokio::spawn(async move { enricher.process(batch).await })));
    }

    let mut first_failure: Option<NewsSyncError> = None;
    for (name, handle) in handles {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(NewsSyncError::Enrichment(format!(
                "enricher task panicked: {join_err}"
            ))),
        };

        if let Err(e) = outcome {
            warn!(enricher = %name, error = %e, "enricher failed");
            if first_failure.is_none() {
                first_failure = Some(e);
            }
        } else {
            debug!(enricher = %name, "enricher finished");
        }
    }

    match first_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Built-in enrichers
// ---------------------------------------------------------------------------

/// Flags items whose titles contain any of the configured keywords.
pub struct KeywordTagger {
    keywords: Vec<String>,
}

impl KeywordTagger {
    pub fn new(keywords: Vec<String>) -> Self {
        let keywords = keywords.into_iter().map(|k| k.to_lowercase()).collect();
        Self { keywords }
    }

    fn matches(&self, item: &NewsItem) -> bool {
        let Some(title) = &item.title else {
            return false;
        };
        let title = title.to_lowercase();
        self.keywords.iter().any(|k| title.contains(k))
    }
}

#[async_trait]
impl Enricher for KeywordTagger {
    fn name(&self) -> &str {
        "keyword-tagger"
    }

    async fn process(&self, items: Arc<Vec<NewsItem>>) -> Result<()> {
        for item in items.iter().filter(|i| self.matches(i)) {
            info!(item = %item, title = ?item.title, "keyword match");
        }
        Ok(())
    }
}

/// Logs one summary line per batch; keeps a heartbeat in the logs even when
/// a run finds nothing.
pub struct Heartbeat;

#[async_trait]
impl Enricher for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn process(&self, items: Arc<Vec<NewsItem>>) -> Result<()> {
        info!(new_items = items.len(), "sync batch processed");
        Ok(())
    }
}

/// The enricher set used by the CLI.
pub fn default_enrichers(keywords: Vec<String>) -> Vec<Arc<dyn Enricher>> {
    let mut set: Vec<Arc<dyn Enricher>> = vec![Arc::new(Heartbeat)];
    if !keywords.is_empty() {
        set.push(Arc::new(KeywordTagger::new(keywords)));
    }
    set
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::item;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts invocations and batch sizes; optionally fails or dawdles.
    struct Recording {
        name: String,
        calls: Arc<AtomicUsize>,
        seen: Arc<AtomicUsize>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl Recording {
        fn new(name: &str) -> Self {
            Self {
                name: name.into(),
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(AtomicUsize::new(0)),
                fail: false,
                delay: None,
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl Enricher for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        async fn process(&self, items: Arc<Vec<NewsItem>>) -> Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.fetch_add(items.len(), Ordering::SeqCst);
            if self.fail {
                return Err(NewsSyncError::Enrichment(format!(
                    "{} scripted failure",
                    self.name
                )));
            }
            Ok(())
        }
    }

    fn batch(ids: &[u64]) -> Arc<Vec<NewsItem>> {
        Arc::new(ids.iter().map(|id| item("x", *id)).collect())
    }

    #[tokio::test]
    async fn all_enrichers_see_the_same_snapshot() {
        let a = Arc::new(Recording::new("a"));
        let b = Arc::new(Recording::new("b"));
        let enrichers: Vec<Arc<dyn Enricher>> = vec![a.clone(), b.clone()];

        run_enrichers(&enrichers, batch(&[1, 2, 3]))
            .await
            .expect("fan-out");

        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.seen.load(Ordering::SeqCst), 3);
        assert_eq!(b.seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failure_waits_for_slower_peers() {
        // The failing enricher finishes immediately; the slow one must still
        // complete before the error comes back.
        let fast = Arc::new(Recording::new("fast").failing());
        let slow = Arc::new(Recording::new("slow").slow(Duration::from_millis(50)));
        let enrichers: Vec<Arc<dyn Enricher>> = vec![fast.clone(), slow.clone()];

        let result = run_enrichers(&enrichers, batch(&[1])).await;

        assert!(result.is_err());
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_failure_in_registration_order_wins() {
        let a = Arc::new(Recording::new("a").failing().slow(Duration::from_millis(30)));
        let b = Arc::new(Recording::new("b").failing());
        let enrichers: Vec<Arc<dyn Enricher>> = vec![a, b];

        let err = run_enrichers(&enrichers, batch(&[1])).await.unwrap_err();
        assert!(err.to_string().contains("a scripted failure"), "{err}");
    }

    #[tokio::test]
    async fn empty_batch_still_runs_everyone() {
        let a = Arc::new(Recording::new("a"));
        let enrichers: Vec<Arc<dyn Enricher>> = vec![a.clone()];

        run_enrichers(&enrichers, batch(&[])).await.expect("fan-out");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keyword_tagger_matches_case_insensitively() {
        let tagger = KeywordTagger::new(vec!["Rust".into()]);
        let hit = item("x", 1);
        assert!(tagger.matches(&NewsItem {
            title: Some("big rust release".into()),
            ..hit.clone()
        }));
        assert!(!tagger.matches(&NewsItem {
            title: None,
            ..hit
        }));
    }

    #[test]
    fn default_set_skips_tagger_without_keywords() {
        assert_eq!(default_enrichers(Vec::new()).len(), 1);
        assert_eq!(default_enrichers(vec!["ai".into()]).len(), 2);
    }
}
