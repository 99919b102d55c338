//! Application configuration for newssync.
//!
//! User config lives at `~/.newssync/newssync.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! The order of `[[sources]]` entries is load-bearing: sources are
//! synchronized in declaration order and the run result concatenates their
//! contributions in that same order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NewsSyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "newssync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".newssync";

// ---------------------------------------------------------------------------
// Config structs (matching newssync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Configured sources, in synchronization order.
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Candidate URLs requested per pagination step, shared across sources.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-source ceiling on scanned items before the catch-up fallback.
    #[serde(default = "default_max_scan")]
    pub max_scan: u32,

    /// Path to the local database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Keywords highlighted by the enrichment stage. Empty disables tagging.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_scan: default_max_scan(),
            db_path: default_db_path(),
            keywords: Vec::new(),
        }
    }
}

fn default_page_size() -> u32 {
    10
}
fn default_max_scan() -> u32 {
    100
}
fn default_db_path() -> String {
    "~/.newssync/newssync.db".into()
}

/// `[[sources]]` entry — one configured feed origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Unique human-readable title; also the storage key for items.
    pub title: String,

    /// Listing URL template with `{count}` and `{offset}` placeholders.
    /// Opaque to the reconciliation engine; consumed by the fetch pipeline.
    pub template: String,

    /// Pipeline kind handling this source. Only "html-list" is built in.
    #[serde(default = "default_kind")]
    pub kind: String,

    /// CSS selector matching item links on the listing page.
    #[serde(default = "default_item_selector")]
    pub item_selector: String,

    /// Regex with one capture group extracting the numeric item id from a URL.
    #[serde(default = "default_id_pattern")]
    pub id_pattern: String,
}

fn default_kind() -> String {
    "html-list".into()
}
fn default_item_selector() -> String {
    "a[href]".into()
}
fn default_id_pattern() -> String {
    r"/news/(\d+)".into()
}

// ---------------------------------------------------------------------------
// Sync config (runtime view consumed by the engine)
// ---------------------------------------------------------------------------

/// Runtime reconciliation parameters shared by every source in a run.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Candidate URLs requested per pagination step.
    pub page_size: u32,
    /// Maximum cumulative offset scanned per source before falling back.
    pub max_scan: u32,
}

impl From<&AppConfig> for SyncConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            page_size: config.defaults.page_size,
            max_scan: config.defaults.max_scan,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.newssync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NewsSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.newssync/newssync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NewsSyncError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| NewsSyncError::config(format!("failed to parse {}: {e}", path.display())))?;

    validate_sources(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NewsSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NewsSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NewsSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check source entries: titles must be unique and non-empty, page size non-zero.
pub fn validate_sources(config: &AppConfig) -> Result<()> {
    if config.defaults.page_size == 0 {
        return Err(NewsSyncError::config("page_size must be at least 1"));
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if source.title.trim().is_empty() {
            return Err(NewsSyncError::config("source with empty title"));
        }
        if !seen.insert(source.title.as_str()) {
            return Err(NewsSyncError::config(format!(
                "duplicate source title '{}'",
                source.title
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("page_size"));
        assert!(toml_str.contains("max_scan"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.page_size, 10);
        assert_eq!(parsed.defaults.max_scan, 100);
    }

    #[test]
    fn config_with_sources_preserves_order() {
        let toml_str = r#"
[defaults]
page_size = 5

[[sources]]
title = "lenta"
template = "https://lenta.example.com/news?count={count}&skip={offset}"

[[sources]]
title = "meduza"
template = "https://meduza.example.com/feed?n={count}&from={offset}"
kind = "html-list"
id_pattern = "/articles/(\\d+)"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].title, "lenta");
        assert_eq!(config.sources[1].title, "meduza");
        // Serde defaults fill the optional pipeline fields
        assert_eq!(config.sources[0].kind, "html-list");
        assert_eq!(config.sources[1].id_pattern, r"/articles/(\d+)");
    }

    #[test]
    fn sync_config_from_app_config() {
        let app = AppConfig::default();
        let sync = SyncConfig::from(&app);
        assert_eq!(sync.page_size, 10);
        assert_eq!(sync.max_scan, 100);
    }

    #[test]
    fn duplicate_titles_rejected() {
        let toml_str = r#"
[[sources]]
title = "lenta"
template = "https://a.example.com/{count}/{offset}"

[[sources]]
title = "lenta"
template = "https://b.example.com/{count}/{offset}"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let result = validate_sources(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn zero_page_size_rejected() {
        let mut config = AppConfig::default();
        config.defaults.page_size = 0;
        assert!(validate_sources(&config).is_err());
    }
}
