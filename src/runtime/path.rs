//! Lexical path helpers shared by the extractor, the cellar and the linker.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
/// A `..` that would climb above the root of an absolute path is dropped.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => result.push(component),
            },
            _ => result.push(component),
        }
    }
    result
}

/// Check if `path` is equal to or nested under `dir`, comparing normalized components.
///
/// `/opt/grew/Cellar/foo/../../etc` is NOT under `/opt/grew/Cellar`, and
/// `/opt/grew/Cellar-old` is not under `/opt/grew/Cellar` either.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);
    normalized_path.starts_with(&normalized_dir)
}

/// Calculate the relative path from a symlink location to a target.
///
/// A link at `<root>/bin/jq` pointing to `<root>/Cellar/jq/1.7/bin/jq`
/// becomes `../Cellar/jq/1.7/bin/jq`, which keeps the prefix relocatable.
///
/// Returns `None` if no relative path between the two exists.
pub fn relative_symlink_path(from_link: &Path, to_target: &Path) -> Option<PathBuf> {
    let from_dir = from_link.parent()?;
    let result = pathdiff::diff_paths(to_target, from_dir)?;

    if result.is_absolute() {
        return None;
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_with_dot_and_parent() {
        assert_eq!(
            normalize_path(Path::new("/opt/grew/./Cellar/jq/../fd")),
            PathBuf::from("/opt/grew/Cellar/fd")
        );
    }

    #[test]
    fn test_normalize_path_cannot_escape_root() {
        assert_eq!(
            normalize_path(Path::new("/tmp/../../../etc/passwd")),
            PathBuf::from("/etc/passwd")
        );
    }

    #[test]
    fn test_normalize_path_relative_keeps_leading_parents() {
        assert_eq!(
            normalize_path(Path::new("../../etc/passwd")),
            PathBuf::from("../../etc/passwd")
        );
        assert_eq!(
            normalize_path(Path::new("a/../../b")),
            PathBuf::from("../b")
        );
    }

    #[test]
    fn test_normalize_path_only_dots() {
        assert_eq!(normalize_path(Path::new("./././.")), PathBuf::from(""));
    }

    #[test]
    fn test_is_path_under_same_and_nested() {
        let cellar = Path::new("/opt/grew/Cellar");
        assert!(is_path_under(cellar, cellar));
        assert!(is_path_under(
            Path::new("/opt/grew/Cellar/jq/1.7/bin/jq"),
            cellar
        ));
    }

    #[test]
    fn test_is_path_under_partial_component_match() {
        assert!(!is_path_under(
            Path::new("/opt/grew/Cellar-old/jq"),
            Path::new("/opt/grew/Cellar")
        ));
    }

    #[test]
    fn test_is_path_under_traversal() {
        assert!(!is_path_under(
            Path::new("/opt/grew/Cellar/jq/../../../../etc/passwd"),
            Path::new("/opt/grew/Cellar")
        ));
        assert!(is_path_under(
            Path::new("/opt/grew/Cellar/jq/../fd/1.0"),
            Path::new("/opt/grew/Cellar")
        ));
    }

    #[test]
    fn test_is_path_under_shorter_path() {
        assert!(!is_path_under(
            Path::new("/opt/grew"),
            Path::new("/opt/grew/Cellar")
        ));
    }

    #[test]
    fn test_relative_symlink_path_into_cellar() {
        assert_eq!(
            relative_symlink_path(
                Path::new("/opt/grew/bin/jq"),
                Path::new("/opt/grew/Cellar/jq/1.7/bin/jq")
            ),
            Some(PathBuf::from("../Cellar/jq/1.7/bin/jq"))
        );
    }

    #[test]
    fn test_relative_symlink_path_opt_pointer() {
        assert_eq!(
            relative_symlink_path(
                Path::new("/opt/grew/opt/jq"),
                Path::new("/opt/grew/Cellar/jq/1.7")
            ),
            Some(PathBuf::from("../Cellar/jq/1.7"))
        );
    }

    #[test]
    fn test_relative_symlink_path_resolves_back() {
        let link = Path::new("/opt/grew/include/jq.h");
        let target = Path::new("/opt/grew/Cellar/jq/1.7/include/jq.h");
        let rel = relative_symlink_path(link, target).unwrap();
        let resolved = normalize_path(&link.parent().unwrap().join(rel));
        assert_eq!(resolved, target);
    }
}
