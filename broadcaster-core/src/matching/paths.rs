//! Changed-file filtering against resource `paths` patterns

use glob::{MatchOptions, Pattern};

const SEPARATOR: char = '/';

/// Glob semantics of a shell path match: `*` never crosses a separator.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// True if any changed file satisfies any pattern.
pub fn match_paths<P, F>(patterns: &[P], files: &[F]) -> bool
where
    P: AsRef<str>,
    F: AsRef<str>,
{
    files.iter().any(|file| {
        patterns
            .iter()
            .any(|pattern| path_matches(pattern.as_ref(), file.as_ref()))
    })
}

/// Whether one file satisfies one pattern.
///
/// A pattern matches when it equals the file, when it ends with `/` and
/// prefixes the file, when the file lies below it as a directory, or when
/// it is a glob matching the file.
pub fn path_matches(pattern: &str, file: &str) -> bool {
    if file == pattern {
        return true;
    }

    if pattern.ends_with(SEPARATOR) && file.starts_with(pattern) {
        return true;
    }

    if file
        .strip_prefix(pattern)
        .is_some_and(|rest| rest.starts_with(SEPARATOR))
    {
        return true;
    }

    Pattern::new(pattern).is_ok_and(|glob| glob.matches_with(file, GLOB_OPTIONS))
}

/// Path filter as applied by the ingestion handlers.
///
/// Pattern lists with fewer than two entries do not filter at all.
pub fn path_filter_allows<P, F>(patterns: &[P], files: &[F]) -> bool
where
    P: AsRef<str>,
    F: AsRef<str>,
{
    patterns.len() <= 1 || match_paths(patterns, files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_pattern() {
        assert!(match_paths(&["src/"], &["src/main.go"]));
        assert!(!match_paths(&["src/"], &["docs/readme.md"]));
    }

    #[test]
    fn test_directory_without_trailing_separator() {
        assert!(match_paths(&["src"], &["src/main.go"]));
        assert!(!match_paths(&["src"], &["srcs/main.go"]));
    }

    #[test]
    fn test_exact_match() {
        assert!(match_paths(&["ci/pipeline.yml"], &["README.md", "ci/pipeline.yml"]));
        assert!(!match_paths(
            &["ap-ae-1/values/globals.yaml"],
            &["qa-de-1/values/designate.yaml"]
        ));
    }

    #[test]
    fn test_glob_does_not_cross_separator() {
        assert!(match_paths(&["docs/*.md"], &["docs/index.md"]));
        assert!(!match_paths(&["docs/*.md"], &["docs/api/index.md"]));
        assert!(match_paths(&["*/values/*.yaml"], &["qa-de-1/values/designate.yaml"]));
    }

    #[test]
    fn test_invalid_glob_is_not_a_match() {
        assert!(!match_paths(&["[unclosed"], &["[unclosed-file"]));
    }

    #[test]
    fn test_no_files_never_match() {
        let files: [&str; 0] = [];
        assert!(!match_paths(&["src/"], &files));
    }

    #[test]
    fn test_short_pattern_lists_do_not_filter() {
        let none: [&str; 0] = [];
        assert!(path_filter_allows(&none, &["docs/readme.md"]));
        assert!(path_filter_allows(&["src/"], &["docs/readme.md"]));
        assert!(!path_filter_allows(&["src/", "lib/"], &["docs/readme.md"]));
        assert!(path_filter_allows(&["src/", "lib/"], &["lib/mod.rs"]));
    }
}
