//! Shared types, error model, and configuration for newssync.
//!
//! This crate is the foundation depended on by all other newssync crates.
//! It provides:
//! - [`NewsSyncError`] — the unified error type
//! - [`NewsItem`] — the domain item with identity-based equality
//! - Configuration ([`AppConfig`], [`SyncConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, SourceEntry, SyncConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_sources,
};
pub use error::{NewsSyncError, Result};
pub use types::NewsItem;
