//! Broadcaster
//!
//! Fans version-control webhooks out to resource checks on one or more CI
//! clusters.
//!
//! - `service`: resource inventory cache, refresh loop, ingestion policy and
//!   the dispatch work queue
//! - `payload`: per-platform webhook payload decoding
//! - `api`: HTTP routes for webhooks, debugging and health
//! - `config`, `metrics`, `supervisor`: process plumbing used by the binary

pub mod api;
pub mod config;
pub mod metrics;
pub mod payload;
pub mod service;
pub mod supervisor;
