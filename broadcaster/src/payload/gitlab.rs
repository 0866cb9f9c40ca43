//! GitLab push event

use serde::Deserialize;

use broadcaster_core::domain::ChangeEvent;

use super::{Decoded, IngestError};
use crate::service::Platform;

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    #[serde(default, rename = "ref")]
    pub git_ref: String,
    pub repository: Option<Repository>,
    #[serde(default)]
    pub commits: Vec<Commit>,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub git_http_url: String,
    #[serde(default)]
    pub git_ssh_url: String,
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
        let repository = self
            .repository
            .ok_or(IngestError::MissingRepository(Platform::GitLab))?;

        let url = if repository.git_http_url.is_empty() {
            repository.git_ssh_url
        } else {
            repository.git_http_url
        };
        if url.is_empty() {
            return Err(IngestError::MissingRepository(Platform::GitLab));
        }

        let changed_files = self.commits.into_iter().flat_map(|commit| {
            commit
                .added
                .into_iter()
                .chain(commit.removed)
                .chain(commit.modified)
        });

        Ok(Decoded::Event(
            ChangeEvent::new(url)
                .with_ref(&self.git_ref)
                .with_changed_files(changed_files),
        ))
    }
}
