//! Canonical repository identity

use std::fmt;

use crate::domain::resource::is_placeholder;

/// URL schemes a git remote can use.
const SCHEMES: &[&str] = &["https", "http", "git", "ssh", "git+ssh"];

const GIT_SUFFIX: &str = ".git";

/// Canonical `(host, path)` pair identifying a repository.
///
/// Two URLs refer to the same repository iff their identities are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryIdentity {
    /// Lower-cased host name without credentials or port.
    pub host: String,
    /// Slash-separated path without surrounding slashes or `.git` suffix.
    pub path: String,
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}/{}", self.host, self.path)
    }
}

/// Canonicalizes a git URL.
///
/// Accepts `https://`, `http://`, `git://` and `ssh://` URLs as well as the
/// scp-like shorthand `user@host:path`. Credentials, scheme, port and a
/// trailing `.git` are dropped. Returns `None` for anything that does not
/// look like a repository location.
pub fn normalize(raw: &str) -> Option<RepositoryIdentity> {
    let raw = raw.trim();
    if raw.is_empty() || is_placeholder(raw) {
        return None;
    }

    let (authority, path) = match raw.split_once("://") {
        Some((scheme, rest)) => {
            if !SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
                return None;
            }
            let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
            (strip_port(strip_userinfo(authority)), path)
        }
        None => {
            let (authority, path) = raw.split_once(':')?;
            if authority.contains('/') {
                return None;
            }
            (strip_userinfo(authority), path)
        }
    };

    let host = authority.trim().to_ascii_lowercase();
    let path = normalize_path(path);

    if host.is_empty() || path.is_empty() {
        return None;
    }

    Some(RepositoryIdentity { host, path })
}

/// Whether two URLs name the same repository.
///
/// URLs that cannot be normalized never match anything.
pub fn same_repository(a: &str, b: &str) -> bool {
    match (normalize(a), normalize(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn strip_userinfo(authority: &str) -> &str {
    authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host)
}

fn strip_port(authority: &str) -> &str {
    match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let joined = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    match joined.strip_suffix(GIT_SUFFIX) {
        Some(stripped) => stripped.trim_end_matches('/').to_string(),
        None => joined,
    }
}
