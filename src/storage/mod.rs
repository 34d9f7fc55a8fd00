//! On-disk stores around the pipeline.
//!
//! - [`profiles`] - persona profile files
//! - [`outputs`] - saved run records, human annotations and CSV export

pub mod outputs;
pub mod profiles;

use std::path::{Component, Path, PathBuf};

pub use outputs::{
    to_csv, HumanAnnotation, HumanEdit, HumanEdits, OutputStore, OutputSummary, RunMetadata, RunRecord,
    StoredUtterance,
};
pub use profiles::ProfileStore;

use crate::utilities::errors::StorageError;

/// Join a caller-supplied file name onto `dir`, refusing anything that is
/// not a single plain path component.
pub(crate) fn checked_path(dir: &Path, name: &str) -> Result<PathBuf, StorageError> {
    let invalid = || StorageError::InvalidName {
        name: name.to_string(),
    };
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return Err(invalid());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(name)),
        _ => Err(invalid()),
    }
}

/// `*.json` file names in `dir`, sorted ascending.
pub(crate) fn json_file_names(dir: &Path) -> Result<Vec<String>, StorageError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_path_accepts_plain_names() {
        let dir = Path::new("/data");
        assert_eq!(
            checked_path(dir, "20250101_120000_会議.json").unwrap(),
            PathBuf::from("/data/20250101_120000_会議.json")
        );
    }

    #[test]
    fn test_checked_path_rejects_traversal() {
        let dir = Path::new("/data");
        for name in ["", "..", ".", "../secret.json", "a/b.json", "a\\b.json", "/etc/passwd"] {
            assert!(
                matches!(checked_path(dir, name), Err(StorageError::InvalidName { .. })),
                "accepted {name:?}"
            );
        }
    }

    #[test]
    fn test_json_file_names_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();
        assert_eq!(json_file_names(dir.path()).unwrap(), vec!["a.json", "b.json"]);
    }
}
