//! HTML listing pipeline — the built-in "html-list" source kind.
//!
//! Treats the source's template as a listing URL with `{count}` and
//! `{offset}` placeholders for server-side pagination. Item links are
//! extracted from the listing with a configured CSS selector in document
//! order (sources list newest first); the numeric item id is taken from the
//! item URL with a configured regex.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use newssync_shared::{NewsItem, NewsSyncError, Result, SourceEntry};

use super::FeedPipeline;

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("newssync/", env!("CARGO_PKG_VERSION"));

/// Pipeline for sources exposing a paginated HTML listing of item links.
#[derive(Debug)]
pub struct HtmlListPipeline {
    source: String,
    client: Client,
    item_selector: String,
    id_pattern: Regex,
}

impl HtmlListPipeline {
    /// Build a pipeline for one source entry, validating its selector and
    /// id pattern up front.
    pub fn new(entry: &SourceEntry) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NewsSyncError::Fetch(format!("failed to build HTTP client: {e}")))?;

        // Selector is re-parsed per page because scraper documents are
        // thread-bound; validate it once here so a bad config fails eagerly.
        Selector::parse(&entry.item_selector).map_err(|e| {
            NewsSyncError::config(format!(
                "source '{}': invalid item_selector '{}': {e}",
                entry.title, entry.item_selector
            ))
        })?;

        let id_pattern = Regex::new(&entry.id_pattern).map_err(|e| {
            NewsSyncError::config(format!(
                "source '{}': invalid id_pattern '{}': {e}",
                entry.title, entry.id_pattern
            ))
        })?;

        if id_pattern.captures_len() < 2 {
            return Err(NewsSyncError::config(format!(
                "source '{}': id_pattern '{}' needs a capture group for the item id",
                entry.title, entry.id_pattern
            )));
        }

        Ok(Self {
            source: entry.title.clone(),
            client,
            item_selector: entry.item_selector.clone(),
            id_pattern,
        })
    }

    /// Fetch a URL and return the response body, failing on non-2xx status.
    async fn fetch_text(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| NewsSyncError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsSyncError::Fetch(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| NewsSyncError::Fetch(format!("{url}: body read failed: {e}")))
    }
}

#[async_trait]
impl FeedPipeline for HtmlListPipeline {
    async fn generate_page(&self, template: &str, count: u32, offset: u32) -> Result<Vec<Url>> {
        let listing_url = Url::parse(&fill_template(template, count, offset))
            .map_err(|e| NewsSyncError::Fetch(format!("invalid listing URL template: {e}")))?;

        debug!(source = %self.source, %listing_url, offset, "fetching listing page");
        let body = self.fetch_text(&listing_url).await?;

        let links = extract_item_links(&body, &self.item_selector, &listing_url)?;

        // The listing may render more anchors than one pagination step's
        // worth; everything past `count` belongs to a later step.
        let mut links = links;
        links.truncate(count as usize);
        Ok(links)
    }

    async fn validate(&self, urls: Vec<Url>) -> Result<Vec<Url>> {
        let kept: Vec<Url> = urls
            .into_iter()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .filter(|u| self.id_pattern.is_match(u.as_str()))
            .collect();
        Ok(kept)
    }

    async fn parse(&self, url: &Url) -> Result<NewsItem> {
        let id = self.item_id(url)?;
        let body = self
            .fetch_text(url)
            .await
            .map_err(|e| NewsSyncError::parse(e.to_string()))?;

        let (title, text) = extract_article(&body);

        Ok(NewsItem {
            id,
            source: self.source.clone(),
            url: url.to_string(),
            title,
            body: text,
            fetched_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "html-list"
    }
}

impl HtmlListPipeline {
    /// Extract the stable item id from an item URL.
    fn item_id(&self, url: &Url) -> Result<u64> {
        let caps = self.id_pattern.captures(url.as_str()).ok_or_else(|| {
            NewsSyncError::parse(format!("no item id in {url} (pattern {})", self.id_pattern))
        })?;

        caps.get(1)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .ok_or_else(|| NewsSyncError::parse(format!("non-numeric item id in {url}")))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Substitute `{count}` and `{offset}` placeholders in a listing template.
fn fill_template(template: &str, count: u32, offset: u32) -> String {
    template
        .replace("{count}", &count.to_string())
        .replace("{offset}", &offset.to_string())
}

/// Extract item links from a listing page, in document order, resolved
/// against the listing URL, deduplicated.
fn extract_item_links(html: &str, selector: &str, base_url: &Url) -> Result<Vec<Url>> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(selector)
        .map_err(|e| NewsSyncError::validation(format!("invalid selector '{selector}': {e}")))?;

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&sel) {
        if let Some(href) = el.value().attr("href") {
            if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:")
            {
                continue;
            }

            if let Ok(mut resolved) = base_url.join(href) {
                resolved.set_fragment(None);
                if seen.insert(resolved.to_string()) {
                    links.push(resolved);
                }
            }
        }
    }

    Ok(links)
}

/// Extract a headline and main text from an article page.
fn extract_article(html: &str) -> (Option<String>, Option<String>) {
    let doc = Html::parse_document(html);

    let title = ["h1", "title"].iter().find_map(|s| {
        let sel = Selector::parse(s).unwrap();
        doc.select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    // Readability heuristics: main content container first, body as last resort
    let text = ["main", "article", r#"[role="main"]"#, ".content", "body"]
        .iter()
        .find_map(|s| {
            let sel = Selector::parse(s).unwrap();
            doc.select(&sel)
                .next()
                .map(|el| {
                    el.text()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .filter(|t| !t.is_empty())
        });

    (title, text)
}
