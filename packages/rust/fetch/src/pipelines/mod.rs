//! Feed pipeline trait and the per-source pipeline registry.
//!
//! A pipeline is the fetch side of one source: it generates a page of
//! candidate item URLs, filters out the ones it judges invalid, and parses a
//! URL into a [`NewsItem`]. The reconciliation engine composes the three
//! operations once per pagination step and owns everything after that.

mod html_list;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use newssync_shared::{AppConfig, NewsItem, NewsSyncError, Result};

pub use html_list::HtmlListPipeline;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The fetch contract one source exposes to the reconciliation engine.
#[async_trait]
pub trait FeedPipeline: Send + Sync {
    /// Produce up to `count` candidate item URLs for the pagination step at
    /// `offset` (items already scanned this run). Returns fewer than `count`
    /// URLs, possibly zero, when the source is exhausted.
    async fn generate_page(&self, template: &str, count: u32, offset: u32) -> Result<Vec<Url>>;

    /// Drop URLs this pipeline judges invalid for item parsing.
    async fn validate(&self, urls: Vec<Url>) -> Result<Vec<Url>>;

    /// Convert one URL into an item. Fails with a parse error when the URL
    /// cannot be converted; the engine does not retry.
    async fn parse(&self, url: &Url) -> Result<NewsItem>;

    /// Human-readable pipeline name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps each configured source title to its pipeline.
///
/// Built once at configuration-load time; a source with an unknown pipeline
/// kind fails the build before any synchronization starts.
pub struct PipelineRegistry {
    pipelines: HashMap<String, Arc<dyn FeedPipeline>>,
}

impl std::fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("pipelines", &self.pipelines.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PipelineRegistry {
    /// Build a registry covering every configured source.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut pipelines: HashMap<String, Arc<dyn FeedPipeline>> = HashMap::new();

        for source in &config.sources {
            let pipeline: Arc<dyn FeedPipeline> = match source.kind.as_str() {
                "html-list" => Arc::new(HtmlListPipeline::new(source)?),
                kind => {
                    return Err(NewsSyncError::config(format!(
                        "source '{}' has unknown pipeline kind '{kind}'",
                        source.title
                    )));
                }
            };
            pipelines.insert(source.title.clone(), pipeline);
        }

        Ok(Self { pipelines })
    }

    /// Build a registry from pre-constructed pipelines, keyed by source
    /// title. Lets callers register pipelines the config schema does not
    /// describe, including in-memory ones in tests.
    pub fn from_pipelines(pipelines: HashMap<String, Arc<dyn FeedPipeline>>) -> Self {
        Self { pipelines }
    }

    /// Look up the pipeline for a source title.
    pub fn get(&self, title: &str) -> Result<Arc<dyn FeedPipeline>> {
        self.pipelines.get(title).cloned().ok_or_else(|| {
            NewsSyncError::config(format!("no pipeline registered for source '{title}'"))
        })
    }
}
