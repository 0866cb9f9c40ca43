//! Repository identity matching
//!
//! Pure functions deciding whether a change notification concerns a cached
//! resource:
//! - [`git_url`]: canonical `(host, path)` identity of any git URL form
//! - [`source_uri`]: comparable URL derived from a resource's source config
//! - [`paths`]: changed-file filtering against `paths` patterns

pub mod git_url;
pub mod paths;
pub mod source_uri;

pub use git_url::{RepositoryIdentity, normalize, same_repository};
pub use paths::{match_paths, path_filter_allows, path_matches};
pub use source_uri::construct_uri;
