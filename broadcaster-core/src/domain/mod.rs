//! Core domain types
//!
//! This module contains the domain structures shared between the cluster
//! client (which fetches them), the resource cache (which stores them) and
//! the dispatch queue (which acts on them).

pub mod dispatch;
pub mod event;
pub mod pipeline;
pub mod resource;

pub use dispatch::{DispatchItem, ResourceCheck, redact_webhook_token};
pub use event::ChangeEvent;
pub use pipeline::{InstanceVars, Pipeline, PipelineRef};
pub use resource::{ResourceConfig, Source};
