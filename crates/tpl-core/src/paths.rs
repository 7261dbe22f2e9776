//! Lexical path normalisation and containment checks

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Lexically clean a path: drop `.` components and resolve `..` against
/// preceding normal components. Does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join `relative` onto `root` and require the cleaned result to lie
/// strictly inside the cleaned root.
///
/// Absolute or prefixed `relative` paths are rejected outright.
pub fn contained_join(root: &Path, relative: impl AsRef<Path>) -> Result<PathBuf> {
    let relative = relative.as_ref();
    let joined = root.join(relative);
    let clean_root = normalize(root);

    if relative.has_root() || relative.is_absolute() {
        return Err(Error::illegal_path(joined, clean_root));
    }

    let dest = normalize(&joined);
    if dest == clean_root || !dest.starts_with(&clean_root) {
        return Err(Error::illegal_path(joined, clean_root));
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize(Path::new("a/b/")), PathBuf::from("a/b"));
    }

    #[test]
    fn test_contained_join_accepts_nested() {
        let dest = contained_join(Path::new("/out"), "src/./main.rs").unwrap();
        assert_eq!(dest, PathBuf::from("/out/src/main.rs"));

        let dest = contained_join(Path::new("/out/"), "a/../b").unwrap();
        assert_eq!(dest, PathBuf::from("/out/b"));
    }

    #[test]
    fn test_contained_join_rejects_escape() {
        assert!(matches!(
            contained_join(Path::new("/out"), "../evil"),
            Err(Error::IllegalPath { .. })
        ));
        assert!(matches!(
            contained_join(Path::new("/out"), "a/../../evil"),
            Err(Error::IllegalPath { .. })
        ));
        // sibling directory sharing a string prefix
        assert!(matches!(
            contained_join(Path::new("/out"), "../outside/x"),
            Err(Error::IllegalPath { .. })
        ));
        assert!(matches!(
            contained_join(Path::new("/out"), "/etc/passwd"),
            Err(Error::IllegalPath { .. })
        ));
    }

    #[test]
    fn test_contained_join_rejects_root_itself() {
        assert!(matches!(
            contained_join(Path::new("/out"), "."),
            Err(Error::IllegalPath { .. })
        ));
        assert!(matches!(
            contained_join(Path::new("/out"), ""),
            Err(Error::IllegalPath { .. })
        ));
    }
}
