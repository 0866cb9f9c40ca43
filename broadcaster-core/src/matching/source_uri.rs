//! Comparable repository URL from a resource's source configuration
//!
//! Resource types store their repository in different keys: `uri` (git),
//! `repository` (pull-request style resources) or `url` together with
//! `team`/`repo` (Bitbucket API based resources).

use crate::domain::resource::Source;

use super::git_url::normalize;

/// API root used by Bitbucket resources that store `team` and `repo` apart.
const BITBUCKET_API_ROOT: &str = "https://api.bitbucket.org";
const BITBUCKET_WEB_ROOT: &str = "https://bitbucket.org";

/// Derives a comparable URL from a resource's source configuration.
///
/// Git-looking values are returned in canonical `https://host/path` form.
/// Secret placeholders are never treated as URLs.
pub fn construct_uri(source: &Source) -> Option<String> {
    if let Some(url) = source.get_str("url") {
        if url.trim_end_matches('/') == BITBUCKET_API_ROOT {
            return bitbucket_uri(source);
        }
        return Some(canonicalize(url));
    }

    ["uri", "repository"]
        .into_iter()
        .filter_map(|key| source.get_str(key))
        .map(canonicalize)
        .find(|uri| is_absolute_url(uri))
}

fn bitbucket_uri(source: &Source) -> Option<String> {
    let team = source.get_str("team")?;
    let repo = source.get_str("repo")?;
    Some(format!("{BITBUCKET_WEB_ROOT}/{team}/{repo}"))
}

fn canonicalize(value: &str) -> String {
    normalize(value).map_or_else(|| value.to_string(), |id| id.to_string())
}

/// Absolute URI (`scheme:...`) or absolute path.
fn is_absolute_url(value: &str) -> bool {
    if value.starts_with('/') {
        return true;
    }

    let Some((scheme, rest)) = value.split_once(':') else {
        return false;
    };

    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    valid_scheme && !rest.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(pairs: &[(&str, serde_json::Value)]) -> Source {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn test_uri_field_is_canonicalized() {
        let s = source(&[("uri", json!("git@github.com:org/app.git"))]);
        assert_eq!(construct_uri(&s).as_deref(), Some("https://github.com/org/app"));
    }

    #[test]
    fn test_url_field_wins() {
        let s = source(&[
            ("url", json!("https://gitlab.example/org/app")),
            ("uri", json!("https://other.example/org/app")),
        ]);
        assert_eq!(
            construct_uri(&s).as_deref(),
            Some("https://gitlab.example/org/app")
        );
    }

    #[test]
    fn test_bitbucket_api_root_uses_team_and_repo() {
        let s = source(&[
            ("url", json!("https://api.bitbucket.org")),
            ("team", json!("acme")),
            ("repo", json!("widgets")),
        ]);
        assert_eq!(
            construct_uri(&s).as_deref(),
            Some("https://bitbucket.org/acme/widgets")
        );

        let incomplete = source(&[("url", json!("https://api.bitbucket.org"))]);
        assert_eq!(construct_uri(&incomplete), None);
    }

    #[test]
    fn test_repository_must_be_a_url() {
        let image = source(&[("repository", json!("alpine"))]);
        assert_eq!(construct_uri(&image), None);

        let pr = source(&[("repository", json!("https://github.com/org/app"))]);
        assert_eq!(construct_uri(&pr).as_deref(), Some("https://github.com/org/app"));
    }

    #[test]
    fn test_placeholders_are_ignored() {
        let s = source(&[
            ("url", json!("((bitbucket-url))")),
            ("uri", json!("((git-uri))")),
        ]);
        assert_eq!(construct_uri(&s), None);
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(construct_uri(&Source::default()), None);
    }
}
