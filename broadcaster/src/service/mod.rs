//! Service Module
//!
//! Business logic of the broadcaster. The cache mirrors the clusters'
//! resources, ingestion matches change events against it and the queue
//! delivers the resulting checks.

pub mod cache;
pub mod ingest;
pub mod queue;
pub mod refresh;

// Re-export for convenience
pub use cache::{CacheError, CacheFilter, ResourceCache};
pub use ingest::{MatchPolicy, Platform};
pub use queue::RequestQueue;
