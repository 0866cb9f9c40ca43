//! Platform-independent change notification

use serde::{Deserialize, Serialize};

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// A push or change notification reduced to what matching needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Repository URL in whatever form the platform reports it.
    pub repository_url: String,
    /// Changed branch name, without the `refs/heads/` prefix.
    pub branch: Option<String>,
    /// The repository's default branch, when the platform reports it.
    pub default_branch: Option<String>,
    pub changed_files: Vec<String>,
}

impl ChangeEvent {
    pub fn new(repository_url: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            ..Self::default()
        }
    }

    /// Sets the branch from a git ref such as `refs/heads/main`.
    pub fn with_ref(mut self, git_ref: &str) -> Self {
        self.branch = branch_from_ref(git_ref);
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        let branch = branch.into();
        self.branch = (!branch.is_empty()).then_some(branch);
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        let branch = branch.into();
        self.default_branch = (!branch.is_empty()).then_some(branch);
        self
    }

    pub fn with_changed_files(mut self, files: impl IntoIterator<Item = String>) -> Self {
        self.changed_files.extend(files);
        self
    }
}

/// Strips `refs/heads/` from a git ref; empty refs yield `None`.
pub fn branch_from_ref(git_ref: &str) -> Option<String> {
    let branch = git_ref.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(git_ref);
    (!branch.is_empty()).then(|| branch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_from_ref() {
        assert_eq!(branch_from_ref("refs/heads/main").as_deref(), Some("main"));
        assert_eq!(
            branch_from_ref("refs/heads/feature/x").as_deref(),
            Some("feature/x")
        );
        assert_eq!(branch_from_ref("main").as_deref(), Some("main"));
        assert_eq!(branch_from_ref(""), None);
    }

    #[test]
    fn test_builder() {
        let event = ChangeEvent::new("https://git.example/org/app.git")
            .with_ref("refs/heads/main")
            .with_default_branch("main")
            .with_changed_files(vec!["a.txt".to_string()]);

        assert_eq!(event.branch.as_deref(), Some("main"));
        assert_eq!(event.default_branch.as_deref(), Some("main"));
        assert_eq!(event.changed_files, vec!["a.txt"]);
    }
}
