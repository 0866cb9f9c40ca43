//! Data Transfer Objects for the upstream CI API
//!
//! Wire shapes returned by the cluster API and the token endpoint. Only the
//! fields the broadcaster reads are modelled; unknown fields are ignored.

pub mod auth;
pub mod pipeline;
pub mod team;
