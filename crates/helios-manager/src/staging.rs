//! Per-task working directories under the configured storage root, and
//! extraction of a submitted ZIP archive into one of them.

use std::path::{Path, PathBuf};

use helios_core::path_safety::joined_path_stays_under_root;
use helios_core::{safe_relative_path, AdmissionError, TaskId};

/// A task's working directory on disk. Owns cleanup: every admission
/// failure path after `create` calls `remove` before returning, so a
/// rejected submission never leaves a directory behind.
///
/// Not a `Drop` impl: cleanup is filesystem I/O that can fail, and a
/// destructor has nowhere useful to report that failure.
pub struct WorkingDir {
    path: PathBuf,
}

impl WorkingDir {
    pub async fn create(root: &Path, task_id: TaskId) -> Result<Self, AdmissionError> {
        let path = root.join(task_id.to_string());
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| AdmissionError::StorageFull(e.to_string()))?;
        Ok(WorkingDir { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(self) {
        if let Err(err) = tokio::fs::remove_dir_all(&self.path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                // Best-effort: the manager has already decided to fail
                // the submission. Leaving an orphaned directory behind
                // is recoverable by an operator; losing the original
                // error to a cleanup failure is not.
                tracing_unavailable_log(&self.path, &err);
            }
        }
    }
}

fn tracing_unavailable_log(path: &Path, err: &std::io::Error) {
    eprintln!("failed to remove working directory {}: {err}", path.display());
}

/// Extract a ZIP archive's bytes into `dest`, rejecting any entry whose
/// path would escape `dest` before writing a single file. Runs
/// synchronously; callers run it on a blocking thread pool since the
/// `zip` crate has no async API.
pub fn extract_zip_into(dest: &Path, bytes: Vec<u8>) -> Result<(), AdmissionError> {
    let reader = std::io::Cursor::new(bytes);
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| AdmissionError::BadArchive(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| AdmissionError::BadArchive(e.to_string()))?;
        let name = entry.name().to_string();
        let relative = safe_relative_path(&name)?;
        let out_path = dest.join(&relative);
        if !joined_path_stays_under_root(dest, &out_path) {
            return Err(AdmissionError::UnsafePath(name));
        }

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| AdmissionError::BadArchive(e.to_string()))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AdmissionError::BadArchive(e.to_string()))?;
        }
        let mut out_file =
            std::fs::File::create(&out_path).map_err(|e| AdmissionError::BadArchive(e.to_string()))?;
        std::io::copy(&mut entry, &mut out_file)
            .map_err(|e| AdmissionError::BadArchive(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let options = zip::write::FileOptions::default();
            for (name, contents) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn extracts_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_with(&[("main.py", "print(1)"), ("lib/helper.py", "pass")]);
        extract_zip_into(dir.path(), bytes).unwrap();
        assert!(dir.path().join("main.py").exists());
        assert!(dir.path().join("lib/helper.py").exists());
    }

    #[test]
    fn rejects_path_traversal_entries() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_with(&[("../escape.py", "pass")]);
        let err = extract_zip_into(dir.path(), bytes).unwrap_err();
        assert_eq!(err.code(), "UNSAFE_PATH");
    }

    #[test]
    fn rejects_absolute_entries() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_with(&[("/etc/passwd", "pass")]);
        let err = extract_zip_into(dir.path(), bytes).unwrap_err();
        assert_eq!(err.code(), "UNSAFE_PATH");
    }

    #[test]
    fn rejects_malformed_archive() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_zip_into(dir.path(), b"not a zip".to_vec()).unwrap_err();
        assert_eq!(err.code(), "BAD_ARCHIVE");
    }
}
