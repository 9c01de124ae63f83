//! Directory listing for spec and data sweeps

use std::io;
use std::path::{Path, PathBuf};

/// Whether a file name marks a hidden file
pub fn is_hidden(file_name: &str) -> bool {
    file_name.starts_with('.')
}

/// Regular files in `dir` with the given extension, sorted by file name
///
/// Hidden files are left out and logged at info.
pub fn scan_dir(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if is_hidden(&entry.file_name().to_string_lossy()) {
            tracing::info!(file = %path.display(), "Ignoring hidden file");
            continue;
        }

        files.push(path);
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_dir_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.csv", "a.csv", ".hidden.csv", "notes.txt", "c.CSV"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let names: Vec<String> = scan_dir(dir.path(), "csv")
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.csv", "b.csv"]);
    }

    #[test]
    fn test_scan_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_dir(&dir.path().join("missing"), "txt").is_err());
    }
}
