//! GitHub push event

use serde::Deserialize;

use broadcaster_core::domain::ChangeEvent;

use super::{Decoded, IngestError};
use crate::service::Platform;

/// `after` of a push that deleted the branch
const DELETED_SHA: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    #[serde(default, rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub after: String,
    #[serde(default)]
    pub compare: String,
    pub repository: Option<Repository>,
    #[serde(default)]
    pub commits: Vec<Commit>,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub clone_url: String,
    #[serde(default)]
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
}

impl PushEvent {
    pub fn into_decoded(self) -> Result<Decoded, IngestError> {
        if self.after == DELETED_SHA {
            return Ok(Decoded::Ignored(format!(
                "skipping deletion event for {}",
                self.git_ref
            )));
        }

        let repository = self
            .repository
            .filter(|repo| !repo.clone_url.is_empty())
            .ok_or(IngestError::MissingRepository(Platform::GitHub))?;

        let changed_files = self
            .commits
            .into_iter()
            .flat_map(|commit| {
                commit
                    .added
                    .into_iter()
                    .chain(commit.removed)
                    .chain(commit.modified)
            });

        Ok(Decoded::Event(
            ChangeEvent::new(repository.clone_url)
                .with_ref(&self.git_ref)
                .with_default_branch(repository.default_branch)
                .with_changed_files(changed_files),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::decode;
    use serde_json::json;

    #[test]
    fn test_push_event() {
        let body = json!({
            "ref": "refs/heads/main",
            "after": "1f2e3d",
            "compare": "https://github.com/acme/app/compare/a...b",
            "repository": {
                "full_name": "acme/app",
                "clone_url": "https://github.com/acme/app.git",
                "default_branch": "main"
            },
            "commits": [
                { "id": "1", "added": ["a.txt"], "removed": [], "modified": ["src/lib.rs"] },
                { "id": "2", "added": [], "removed": ["old.txt"], "modified": [] }
            ]
        });

        let decoded = decode(Platform::GitHub, body.to_string().as_bytes()).unwrap();
        let Decoded::Event(event) = decoded else {
            panic!("expected an event");
        };

        assert_eq!(event.repository_url, "https://github.com/acme/app.git");
        assert_eq!(event.branch.as_deref(), Some("main"));
        assert_eq!(event.default_branch.as_deref(), Some("main"));
        assert_eq!(event.changed_files, ["a.txt", "src/lib.rs", "old.txt"]);
    }

    #[test]
    fn test_deletion_is_ignored() {
        let body = json!({
            "ref": "refs/heads/gone",
            "after": DELETED_SHA,
            "repository": { "clone_url": "https://github.com/acme/app.git" }
        });

        let decoded = decode(Platform::GitHub, body.to_string().as_bytes()).unwrap();
        assert!(matches!(decoded, Decoded::Ignored(_)));
    }

    #[test]
    fn test_missing_repository() {
        let body = json!({ "ref": "refs/heads/main", "after": "1" });
        let err = decode(Platform::GitHub, body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MissingRepository(Platform::GitHub)));
    }

    #[test]
    fn test_malformed_body() {
        let err = decode(Platform::GitHub, b"{not json").unwrap_err();
        assert!(matches!(err, IngestError::Malformed { .. }));
        assert!(err.to_string().starts_with("github: failed to parse request body"));
    }
}
