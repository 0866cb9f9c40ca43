//! Broadcaster Core
//!
//! Core types and pure logic for the webhook broadcaster.
//!
//! This crate contains:
//! - Domain types: pipelines, resources, dispatch items and change events
//! - DTOs: wire shapes of the upstream CI API
//! - Matching: repository identity normalization, source URI construction
//!   and changed-path filtering

pub mod domain;
pub mod dto;
pub mod matching;
