//! Lexical path handling for tape destinations.
//!
//! Tape paths never touch the local filesystem, so normalisation is purely
//! textual and follows POSIX `normpath` rules.

/// Collapse repeated separators and `.`, and resolve `..` against preceding components.
///
/// Absolute paths never climb above `/`; relative paths keep leading `..`
/// components. An empty result becomes `.`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join path segments with `/` and normalise the result.
#[must_use]
pub fn join_tape_path(segments: &[&str]) -> String {
    normalize_path(&segments.join("/"))
}

/// Final component of `path`, ignoring trailing separators.
#[must_use]
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_separators_and_dots() {
        assert_eq!(normalize_path("/tape//a/./b/"), "/tape/a/b");
        assert_eq!(normalize_path("/tape/a/b/../c"), "/tape/a/c");
        assert_eq!(normalize_path("/../tape"), "/tape");
        assert_eq!(normalize_path("a/../../b"), "../b");
        assert_eq!(normalize_path(""), ".");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn join_tape_path_matches_archive_layout() {
        assert_eq!(
            join_tape_path(&["/tape", "/a/b", "X.zip"]),
            "/tape/a/b/X.zip"
        );
        assert_eq!(
            join_tape_path(&[
                "/path/to/hpss",
                "/data/exp/IceCube/2019/filtered/PFFilt/1109"
            ]),
            "/path/to/hpss/data/exp/IceCube/2019/filtered/PFFilt/1109"
        );
    }

    #[test]
    fn basename_returns_final_component() {
        assert_eq!(
            basename("/path/on/source/rse/398ca1ed-0178-4333-a323-8b9158c3dd88.zip"),
            "398ca1ed-0178-4333-a323-8b9158c3dd88.zip"
        );
        assert_eq!(basename("X.zip"), "X.zip");
        assert_eq!(basename("/src/dir/"), "dir");
        assert_eq!(basename(""), "");
    }
}
