//! Path helpers.

use std::path::{Component, Path, PathBuf};

/// Lexically normalizes a path: drops `.` components and folds `..` into the
/// preceding component. The filesystem is never consulted, so symlinks are
/// not resolved.
///
/// Two spellings of the same include file (`a/./b.glsl`, `a/c/../b.glsl`)
/// normalize to the same value, which keeps include-stack membership checks
/// exact.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if popped {
                    out.pop();
                } else if !matches!(out.components().next_back(), Some(Component::RootDir)) {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_cur_dir() {
        assert_eq!(normalize_path(Path::new("a/./b.glsl")), PathBuf::from("a/b.glsl"));
    }

    #[test]
    fn test_normalize_folds_parent_dir() {
        assert_eq!(normalize_path(Path::new("a/c/../b.glsl")), PathBuf::from("a/b.glsl"));
        assert_eq!(normalize_path(Path::new("../x.glsl")), PathBuf::from("../x.glsl"));
        assert_eq!(normalize_path(Path::new("/../x.glsl")), PathBuf::from("/x.glsl"));
    }
}
