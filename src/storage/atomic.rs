//! Whole-file replacement for pages, indexes and sidecars.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::{ReportError, ReportResult};

/// Write `content` to `path` through a temporary file in the same directory,
/// then rename it into place. Readers see either the old file or the new one.
pub fn write_atomic(path: &Path, content: &[u8]) -> ReportResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|e| ReportError::io(format!("failed to create {}", parent.display()), e))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| ReportError::io(format!("failed to write {}", path.display()), e))?;
    tmp.write_all(content)
        .and_then(|_| tmp.flush())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ReportError::io(format!("failed to write {}", path.display()), e))?;
    tmp.persist(path)
        .map_err(|e| ReportError::io(format!("failed to replace {}", path.display()), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_replaces_longer_file_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pages/index.html");
        write_atomic(&path, b"a much longer first version").unwrap();
        write_atomic(&path, b"short").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "short");
        assert_eq!(names(&dir.path().join("pages")), vec!["index.html"]);
    }

    #[test]
    fn test_concurrent_writers_never_interleave() {
        let dir = TempDir::new().unwrap();
        let path = Arc::new(dir.path().join("index.html"));
        let first = "A".repeat(64 * 1024);
        let second = "B".repeat(1024);

        let handles: Vec<_> = [first.clone(), second.clone()]
            .into_iter()
            .map(|content| {
                let path = Arc::clone(&path);
                thread::spawn(move || {
                    for _ in 0..25 {
                        write_atomic(&path, content.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = fs::read_to_string(path.as_ref()).unwrap();
        assert!(text == first || text == second);
        assert_eq!(names(dir.path()), vec!["index.html"]);
    }
}
