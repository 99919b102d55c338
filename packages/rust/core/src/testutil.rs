//! Shared test fixtures: a scripted in-memory feed pipeline.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use url::Url;

use newssync_fetch::FeedPipeline;
use newssync_shared::{NewsItem, NewsSyncError, Result, SourceEntry};

/// A pipeline that replays pre-scripted pages of item ids (newest first per
/// page, as real listings are ordered) without any I/O.
pub(crate) struct ScriptedPipeline {
    source: String,
    pages: Mutex<VecDeque<Vec<u64>>>,
    generate_calls: AtomicUsize,
    fail_parse_on: Option<u64>,
}

impl ScriptedPipeline {
    pub(crate) fn new(source: &str, pages: Vec<Vec<u64>>) -> Self {
        Self {
            source: source.into(),
            pages: Mutex::new(pages.into()),
            generate_calls: AtomicUsize::new(0),
            fail_parse_on: None,
        }
    }

    /// Make `parse` fail for one specific item id.
    pub(crate) fn failing_parse_on(mut self, id: u64) -> Self {
        self.fail_parse_on = Some(id);
        self
    }

    /// Number of pagination steps performed so far.
    pub(crate) fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    fn item_url(&self, id: u64) -> Url {
        Url::parse(&format!("https://{}.example.com/news/{id}", self.source))
            .expect("valid scripted url")
    }
}

#[async_trait]
impl FeedPipeline for ScriptedPipeline {
    async fn generate_page(&self, _template: &str, _count: u32, _offset: u32) -> Result<Vec<Url>> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let ids = self
            .pages
            .lock()
            .expect("pages lock")
            .pop_front()
            .unwrap_or_default();
        Ok(ids.into_iter().map(|id| self.item_url(id)).collect())
    }

    async fn validate(&self, urls: Vec<Url>) -> Result<Vec<Url>> {
        Ok(urls)
    }

    async fn parse(&self, url: &Url) -> Result<NewsItem> {
        let id: u64 = url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| NewsSyncError::parse(format!("no id in {url}")))?;

        if self.fail_parse_on == Some(id) {
            return Err(NewsSyncError::parse(format!("scripted failure for {url}")));
        }

        Ok(NewsItem {
            id,
            source: self.source.clone(),
            url: url.to_string(),
            title: Some(format!("headline {id}")),
            body: None,
            fetched_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A source entry pointing at a scripted pipeline.
pub(crate) fn entry(title: &str) -> SourceEntry {
    SourceEntry {
        title: title.into(),
        template: format!("https://{title}.example.com/news?count={{count}}&skip={{offset}}"),
        kind: "html-list".into(),
        item_selector: "a[href]".into(),
        id_pattern: r"/news/(\d+)".into(),
    }
}

/// A bare item with the given identity.
pub(crate) fn item(source: &str, id: u64) -> NewsItem {
    NewsItem {
        id,
        source: source.into(),
        url: format!("https://{source}.example.com/news/{id}"),
        title: Some(format!("headline {id}")),
        body: None,
        fetched_at: Utc::now(),
    }
}
