//! Path splitting: a path is a non-owning view that separators (`/` or
//! `\`) collapse runs of. The empty path and `/` both denote the root.

/// Scans `path`, collapsing leading separators, and returns the first name
/// component (`root`) along with whatever follows it (`remainder`).
///
/// Absolute and relative paths are treated identically: leading separators
/// are simply skipped. If no separator follows the first component, the
/// returned `remainder` is empty.
pub fn split_root(path: &str) -> (&str, &str) {
    let path = path.trim_start_matches(['/', '\\']);
    match path.find(['/', '\\']) {
        Some(index) => {
            let root = &path[..index];
            let remainder = path[index..].trim_start_matches(['/', '\\']);
            (root, remainder)
        }
        None => (path, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_absolute_path() {
        assert_eq!(split_root("/a/b"), ("a", "b"));
    }

    #[test]
    fn collapses_repeated_separators() {
        assert_eq!(split_root("//a//b"), ("a", "b"));
    }

    #[test]
    fn treats_backslash_as_separator() {
        assert_eq!(
            split_root("\\Program Files\\BMFS"),
            ("Program Files", "BMFS")
        );
    }

    #[test]
    fn root_path_yields_empty_components() {
        assert_eq!(split_root("/"), ("", ""));
    }

    #[test]
    fn no_separator_yields_empty_remainder() {
        assert_eq!(split_root("no-slash"), ("no-slash", ""));
    }

    #[test]
    fn relative_paths_behave_like_absolute() {
        assert_eq!(split_root("a/b"), split_root("/a/b"));
    }
}
