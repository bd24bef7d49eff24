//! Finding complete data/checksum pairs in the `Input` folder.

use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::fs_ops::{FileStore, Folder};
use crate::model::{FileHandle, CHECKSUM_EXTENSION, DATA_EXTENSION};

/// File ids having both a `.dat` and a `.md5` member, sorted.
///
/// Names are grouped by their stem (everything before the last `.`).
pub fn complete_pairs<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    // (has data, has checksum) per stem
    let mut groups: BTreeMap<&str, (bool, bool)> = BTreeMap::new();

    for name in names {
        let Some((stem, extension)) = name.rsplit_once('.') else {
            continue;
        };
        if stem.is_empty() {
            continue;
        }
        let entry = groups.entry(stem).or_default();
        if extension == DATA_EXTENSION {
            entry.0 = true;
        } else if extension == CHECKSUM_EXTENSION {
            entry.1 = true;
        }
    }

    groups
        .into_iter()
        .filter(|(_, (data, checksum))| *data && *checksum)
        .map(|(stem, _)| stem.to_string())
        .collect()
}

/// List `Input` and build one handle per complete pair.
pub fn discover(store: &dyn FileStore, starting_at_row: usize) -> Result<Vec<FileHandle>, EngineError> {
    let names = store.list(Folder::Input)?;
    let handles: Vec<FileHandle> = complete_pairs(names.iter().map(String::as_str))
        .into_iter()
        .map(|file_id| FileHandle::new(store.root(), file_id, starting_at_row))
        .collect();

    tracing::debug!(listed = names.len(), pairs = handles.len(), "Input folder scanned");
    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_ops::LocalFileStore;
    use std::fs;

    #[test]
    fn test_complete_pairs_requires_both_members() {
        let names = ["A.dat", "A.md5", "B.dat", "C.md5", "D.txt", "D.md5", "noext"];
        assert_eq!(complete_pairs(names), vec!["A".to_string()]);
    }

    #[test]
    fn test_complete_pairs_groups_by_last_extension() {
        let names = ["x.y.dat", "x.y.md5", "x.dat", ".md5", ".dat"];
        assert_eq!(complete_pairs(names), vec!["x.y".to_string()]);
    }

    #[test]
    fn test_complete_pairs_sorted() {
        let names = ["b.md5", "a.dat", "b.dat", "a.md5"];
        assert_eq!(complete_pairs(names), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_extensions_are_case_sensitive() {
        let names = ["A.DAT", "A.md5"];
        assert!(complete_pairs(names).is_empty());
    }

    #[test]
    fn test_discover_builds_handles() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = LocalFileStore::new(temp_dir.path());
        store.ensure_layout().expect("Failed to create layout");
        for name in ["A.dat", "A.md5", "B.dat"] {
            fs::write(temp_dir.path().join("Input").join(name), "").expect("Failed to write");
        }

        let handles = discover(&store, 3).expect("Failed to discover");
        assert_eq!(handles, vec![FileHandle::new(temp_dir.path(), "A", 3)]);
    }
}
