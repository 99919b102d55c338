//! Per-source fetch pipelines for newssync.
//!
//! This crate provides:
//! - [`FeedPipeline`] — the generate/validate/parse contract one source exposes
//! - [`PipelineRegistry`] — source title → pipeline mapping, validated at load
//! - [`HtmlListPipeline`] — the built-in HTML listing implementation

pub mod pipelines;

pub use pipelines::{FeedPipeline, HtmlListPipeline, PipelineRegistry};
