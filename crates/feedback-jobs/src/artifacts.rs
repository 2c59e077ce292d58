//! Post-run artifact discovery.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use feedback_core::{Error, Result};

/// Collect the absolute paths of non-directory entries in `dir` whose file
/// name starts with `stem`.
///
/// Paths are returned sorted by name, so a fixed directory state always
/// yields the same sequence. Entries that vanish or cannot be inspected
/// during the scan are skipped; only failure to read `dir` itself is an error.
pub fn discover_artifacts(dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
    let dir = absolute(dir)?;
    let entries = fs::read_dir(&dir)
        .map_err(|e| Error::ArtifactDiscoveryFailed(format!("{}: {}", dir.display(), e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
        if !name.as_encoded_bytes().starts_with(stem.as_bytes()) {
            continue;
        }
        match entry.file_type() {
            Ok(file_type) if !file_type.is_dir() => {
                trace!(path = %entry.path().display(), "Artifact matched");
                files.push(dir.join(&name));
            }
            _ => continue,
        }
    }

    files.sort();
    Ok(files)
}

fn absolute(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::ArtifactDiscoveryFailed(format!("current directory: {}", e)))?;
        Ok(cwd.join(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEM: &str = "deepin-feedback-X-Y-dde-20240101-120000";

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_discovers_prefix_matches_only() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), STEM);
        touch(tmp.path(), &format!("{STEM}.tar.gz"));
        touch(tmp.path(), &format!("{STEM}.part2"));
        touch(tmp.path(), "unrelated.txt");

        let files = discover_artifacts(tmp.path(), STEM).unwrap();
        assert_eq!(
            files,
            vec![
                tmp.path().join(STEM),
                tmp.path().join(format!("{STEM}.part2")),
                tmp.path().join(format!("{STEM}.tar.gz")),
            ]
        );
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_other_requests_with_shared_prefix_text_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "deepin-feedback-X-Y-dde-20240101-115959.tar.gz");
        touch(tmp.path(), "deepin-feedback-X-Y-system-20240101-120000.tar.gz");

        let files = discover_artifacts(tmp.path(), STEM).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_directories_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join(format!("{STEM}.d"))).unwrap();
        touch(tmp.path(), &format!("{STEM}.tar.gz"));

        let files = discover_artifacts(tmp.path(), STEM).unwrap();
        assert_eq!(files, vec![tmp.path().join(format!("{STEM}.tar.gz"))]);
    }

    #[test]
    fn test_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_artifacts(tmp.path(), STEM).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_is_discovery_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("gone");
        let err = discover_artifacts(&missing, STEM).unwrap_err();
        assert!(matches!(err, Error::ArtifactDiscoveryFailed(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_repeated_scans_are_identical() {
        let tmp = tempfile::tempdir().unwrap();
        for suffix in ["c", "a", "b"] {
            touch(tmp.path(), &format!("{STEM}.{suffix}"));
        }
        let first = discover_artifacts(tmp.path(), STEM).unwrap();
        let second = discover_artifacts(tmp.path(), STEM).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
