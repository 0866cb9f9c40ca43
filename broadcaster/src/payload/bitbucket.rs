//! Bitbucket Cloud push and pull request events

use serde::Deserialize;

use broadcaster_core::domain::ChangeEvent;

use super::{Decoded, IngestError};
use crate::service::Platform;

#[derive(Debug, Deserialize)]
pub struct Payload {
    pub push: Option<Push>,
    pub repository: Option<Repository>,
    pub pullrequest: Option<PullRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Push {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    pub old: Option<ChangeRef>,
    pub new: Option<ChangeRef>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRef {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub full_name: String,
    pub links: Option<Links>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub html: Link,
}

#[derive(Debug, Default, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub source: PullRequestEndpoint,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestEndpoint {
    pub branch: Branch,
}

#[derive(Debug, Deserialize)]
pub struct Branch {
    #[serde(default)]
    pub name: String,
}

impl Payload {
    /// Pull request source branch, else the last branch a push touched.
    pub fn branch(&self) -> Option<String> {
        if let Some(pr) = &self.pullrequest {
            return Some(pr.source.branch.name.clone());
        }

        self.push.as_ref().and_then(|push| {
            push.changes.iter().rev().find_map(|change| {
                let touches_branch = change.old.as_ref().is_some_and(|r| r.kind == "branch")
                    || change.new.as_ref().is_some_and(|r| r.kind == "branch");
                if !touches_branch {
                    return None;
                }
                change.new.as_ref().map(|new| new.name.clone())
            })
        })
    }

    pub fn into_decoded(self) -> Result<Decoded, IngestError> {
        let branch = self.branch();

        let url = self
            .repository
            .and_then(|repo| repo.links)
            .map(|links| links.html.href)
            .filter(|href| !href.is_empty())
            .ok_or(IngestError::MissingRepository(Platform::Bitbucket))?;

        let mut event = ChangeEvent::new(url);
        if let Some(branch) = branch {
            event = event.with_branch(branch);
        }
        Ok(Decoded::Event(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::decode;
    use serde_json::json;

    fn repository() -> serde_json::Value {
        json!({
            "full_name": "acme/app",
            "links": { "html": { "href": "https://bitbucket.org/acme/app" } }
        })
    }

    #[test]
    fn test_push_uses_last_branch_change() {
        let body = json!({
            "repository": repository(),
            "push": {
                "changes": [
                    { "old": null, "new": { "name": "first", "type": "branch" } },
                    { "old": { "name": "v1", "type": "tag" }, "new": { "name": "v1", "type": "tag" } },
                    { "old": { "name": "second", "type": "branch" }, "new": { "name": "second", "type": "branch" } }
                ]
            }
        });

        let Decoded::Event(event) =
            decode(Platform::Bitbucket, body.to_string().as_bytes()).unwrap()
        else {
            panic!("expected an event");
        };
        assert_eq!(event.repository_url, "https://bitbucket.org/acme/app");
        assert_eq!(event.branch.as_deref(), Some("second"));
    }

    #[test]
    fn test_deleted_branch_has_no_branch() {
        let body = json!({
            "repository": repository(),
            "push": { "changes": [{ "old": { "name": "gone", "type": "branch" }, "new": null }] }
        });

        let Decoded::Event(event) =
            decode(Platform::Bitbucket, body.to_string().as_bytes()).unwrap()
        else {
            panic!("expected an event");
        };
        assert_eq!(event.branch, None);
    }

    #[test]
    fn test_pull_request_source_branch() {
        let body = json!({
            "repository": repository(),
            "pullrequest": { "source": { "branch": { "name": "feature/x" } } }
        });

        let Decoded::Event(event) =
            decode(Platform::Bitbucket, body.to_string().as_bytes()).unwrap()
        else {
            panic!("expected an event");
        };
        assert_eq!(event.branch.as_deref(), Some("feature/x"));
    }

    #[test]
    fn test_missing_repository() {
        let err = decode(Platform::Bitbucket, br#"{"push":{"changes":[]}}"#).unwrap_err();
        assert!(matches!(err, IngestError::MissingRepository(Platform::Bitbucket)));
    }
}
