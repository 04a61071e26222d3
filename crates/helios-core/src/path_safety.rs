use std::path::{Component, Path, PathBuf};

use crate::error::AdmissionError;

/// Validate that `raw` is a relative path that cannot escape whatever
/// root it's later joined to: no absolute component, no `..`, no
/// empty path. Used both for the submitted `entrypoint` and for every
/// path extracted from an uploaded archive.
pub fn safe_relative_path(raw: &str) -> Result<PathBuf, AdmissionError> {
    if raw.is_empty() {
        return Err(AdmissionError::UnsafePath(raw.to_string()));
    }
    let path = Path::new(raw);
    if path.is_absolute() {
        return Err(AdmissionError::UnsafePath(raw.to_string()));
    }
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(AdmissionError::UnsafePath(raw.to_string()));
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(AdmissionError::UnsafePath(raw.to_string()));
    }
    Ok(normalized)
}

/// Confirm that `candidate`, once joined under `root`, stays under
/// `root`. Used after resolving an archive entry's path to catch
/// escapes that `safe_relative_path` alone wouldn't (e.g. a symlink
/// component is not possible here since we never call `canonicalize`
/// on attacker-controlled input, but a defense-in-depth check on the
/// joined, lexically-normalized path costs nothing).
pub fn joined_path_stays_under_root(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_relative_paths() {
        assert_eq!(safe_relative_path("main.py").unwrap(), PathBuf::from("main.py"));
        assert_eq!(
            safe_relative_path("src/main.py").unwrap(),
            PathBuf::from("src/main.py")
        );
    }

    #[test]
    fn rejects_parent_traversal() {
        assert!(safe_relative_path("../../etc/passwd").is_err());
        assert!(safe_relative_path("a/../../b").is_err());
    }

    #[test]
    fn rejects_absolute_paths() {
        assert!(safe_relative_path("/etc/passwd").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(safe_relative_path("").is_err());
    }
}
