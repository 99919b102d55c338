//! Core reconciliation and orchestration logic for newssync.
//!
//! This crate ties the per-source fetch pipelines and the durable store into
//! one synchronization run: scan each source backwards until the last stored
//! item is found (`reconcile`), fan the result out to enrichment processors
//! (`enrich`), and persist it in a single bulk insert (`sync`).

pub mod enrich;
pub mod reconcile;
pub mod sync;

#[cfg(test)]
pub(crate) mod testutil;
