//! Filesystem operations module.
//!
//! The pipeline never touches `std::fs` directly. It goes through the
//! [`FileStore`] trait, which exposes the handful of operations it needs:
//! - listing the names in a folder
//! - opening a file for streaming reads
//! - reading a small text file
//! - writing a file line by line
//! - moving a file between folders
//!
//! [`LocalFileStore`] implements it over a root directory on local disk.

use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// The fixed folders under a root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Folder {
    /// New data/checksum pairs are dropped here
    Input,
    /// Canonical result files
    Output,
    /// Error reports and rejected input pairs
    Errors,
    /// Successfully processed input pairs
    Done,
}

impl Folder {
    pub const ALL: [Folder; 4] = [Folder::Input, Folder::Output, Folder::Errors, Folder::Done];

    /// Directory name on disk
    pub fn dir_name(&self) -> &'static str {
        match self {
            Folder::Input => "Input",
            Folder::Output => "Output",
            Folder::Errors => "Errors",
            Folder::Done => "Done",
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Storage operations the engine depends on.
///
/// Implementations must be shareable across worker and sink threads.
pub trait FileStore: Send + Sync {
    /// Root directory holding the folders
    fn root(&self) -> &Path;

    /// Names of the regular files directly inside `folder`
    fn list(&self, folder: Folder) -> Result<Vec<String>, EngineError>;

    /// Open a file for streaming reads
    fn open_read(&self, folder: Folder, name: &str) -> Result<Box<dyn Read + Send>, EngineError>;

    /// Read a whole (small) file as text; invalid UTF-8 is replaced, not rejected
    fn read_to_string(&self, folder: Folder, name: &str) -> Result<String, EngineError>;

    /// Create or truncate a file and write each line followed by `\n`
    fn write_lines(
        &self,
        folder: Folder,
        name: &str,
        lines: &mut dyn Iterator<Item = String>,
    ) -> Result<(), EngineError>;

    /// Move `name` from one folder to another, keeping the name
    fn move_between(&self, from: Folder, to: Folder, name: &str) -> Result<(), EngineError>;
}

/// [`FileStore`] backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFileStore { root: root.into() }
    }

    /// Full path of `name` inside `folder`
    pub fn path_of(&self, folder: Folder, name: &str) -> PathBuf {
        self.root.join(folder.dir_name()).join(name)
    }

    /// Create every folder that does not exist yet.
    pub fn ensure_layout(&self) -> Result<(), EngineError> {
        for folder in Folder::ALL {
            let dir = self.root.join(folder.dir_name());
            fs::create_dir_all(&dir)
                .map_err(|e| EngineError::DirectoryCreationFailed { path: dir, source: e })?;
        }
        Ok(())
    }
}

impl FileStore for LocalFileStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list(&self, folder: Folder) -> Result<Vec<String>, EngineError> {
        let dir = self.root.join(folder.dir_name());
        let entries = fs::read_dir(&dir).map_err(|e| EngineError::EnumerationFailed {
            path: dir.clone(),
            source: e,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::EnumerationFailed {
                path: dir.clone(),
                source: e,
            })?;
            let file_type = entry.file_type().map_err(|e| EngineError::EnumerationFailed {
                path: dir.clone(),
                source: e,
            })?;
            if !file_type.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::warn!(folder = %folder, name = ?raw, "Skipping non UTF-8 file name");
                }
            }
        }
        Ok(names)
    }

    fn open_read(&self, folder: Folder, name: &str) -> Result<Box<dyn Read + Send>, EngineError> {
        let path = self.path_of(folder, name);
        let file = fs::File::open(&path).map_err(|e| EngineError::ReadError { path, source: e })?;
        Ok(Box::new(file))
    }

    fn read_to_string(&self, folder: Folder, name: &str) -> Result<String, EngineError> {
        let path = self.path_of(folder, name);
        let bytes = fs::read(&path).map_err(|e| EngineError::ReadError { path, source: e })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn write_lines(
        &self,
        folder: Folder,
        name: &str,
        lines: &mut dyn Iterator<Item = String>,
    ) -> Result<(), EngineError> {
        let path = self.path_of(folder, name);
        ensure_parent_dir_exists(&path)?;

        let write_err = |e: io::Error| EngineError::WriteError {
            path: path.clone(),
            source: e,
        };

        let file = fs::File::create(&path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        for line in lines {
            writer.write_all(line.as_bytes()).map_err(write_err)?;
            writer.write_all(b"\n").map_err(write_err)?;
        }
        writer.flush().map_err(write_err)?;
        Ok(())
    }

    fn move_between(&self, from: Folder, to: Folder, name: &str) -> Result<(), EngineError> {
        let src = self.path_of(from, name);
        let dst = self.path_of(to, name);
        ensure_parent_dir_exists(&dst)?;
        move_file(&src, &dst)
    }
}

/// Rename `src` to `dst`, falling back to copy + delete across devices.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), EngineError> {
    let move_err = |e: io::Error| EngineError::MoveError {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    };

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            copy_file_with_metadata(src, dst)?;
            fs::remove_file(src).map_err(move_err)
        }
        Err(e) => Err(move_err(e)),
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    // EXDEV on unix, ERROR_NOT_SAME_DEVICE on windows
    if cfg!(windows) {
        err.raw_os_error() == Some(17)
    } else {
        err.raw_os_error() == Some(18)
    }
}

/// Copy a file from source to destination with metadata preservation.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_mtime = src_file
        .metadata()
        .map_err(|e| EngineError::ReadError {
            path: src.to_path_buf(),
            source: e,
        })?
        .modified()
        .ok();

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            EngineError::ReadError {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;

    if let Some(mtime) = src_mtime {
        // Best effort; the content is what matters.
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(bytes_copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };

    match fs::metadata(parent) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "Parent path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(parent).map_err(|e| EngineError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalFileStore) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = LocalFileStore::new(temp_dir.path());
        store.ensure_layout().expect("Failed to create layout");
        (temp_dir, store)
    }

    #[test]
    fn test_ensure_layout_creates_folders() {
        let (temp_dir, _store) = store();
        for name in ["Input", "Output", "Errors", "Done"] {
            assert!(temp_dir.path().join(name).is_dir(), "{} should exist", name);
        }
    }

    #[test]
    fn test_list_skips_directories() {
        let (temp_dir, store) = store();
        fs::write(temp_dir.path().join("Input/A.dat"), "x").expect("Failed to write file");
        fs::create_dir(temp_dir.path().join("Input/nested.dat")).expect("Failed to create dir");

        let names = store.list(Folder::Input).expect("Failed to list");
        assert_eq!(names, vec!["A.dat".to_string()]);
    }

    #[test]
    fn test_list_missing_folder_fails() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = LocalFileStore::new(temp_dir.path());
        assert!(matches!(
            store.list(Folder::Input),
            Err(EngineError::EnumerationFailed { .. })
        ));
    }

    #[test]
    fn test_write_lines_terminates_each_line() {
        let (temp_dir, store) = store();
        let mut lines = vec!["first".to_string(), "second".to_string()].into_iter();
        store
            .write_lines(Folder::Output, "A.result.dat", &mut lines)
            .expect("Failed to write");

        let content = fs::read_to_string(temp_dir.path().join("Output/A.result.dat"))
            .expect("Failed to read back");
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_read_to_string_is_lossy() {
        let (temp_dir, store) = store();
        fs::write(temp_dir.path().join("Input/A.md5"), [0xff, b'A']).expect("Failed to write");
        let text = store.read_to_string(Folder::Input, "A.md5").expect("Failed to read");
        assert!(text.ends_with('A'));
    }

    #[test]
    fn test_open_read_missing_file_is_read_error() {
        let (_temp_dir, store) = store();
        assert!(matches!(
            store.open_read(Folder::Input, "missing.dat"),
            Err(EngineError::ReadError { .. })
        ));
    }

    #[test]
    fn test_move_between_folders() {
        let (temp_dir, store) = store();
        fs::write(temp_dir.path().join("Input/A.dat"), "payload").expect("Failed to write");

        store
            .move_between(Folder::Input, Folder::Done, "A.dat")
            .expect("Failed to move");

        assert!(!temp_dir.path().join("Input/A.dat").exists());
        let moved = fs::read_to_string(temp_dir.path().join("Done/A.dat")).expect("Failed to read");
        assert_eq!(moved, "payload");
    }

    #[test]
    fn test_move_missing_source_fails() {
        let (_temp_dir, store) = store();
        assert!(matches!(
            store.move_between(Folder::Input, Folder::Done, "ghost.dat"),
            Err(EngineError::MoveError { .. })
        ));
    }

    #[test]
    fn test_copy_file_with_metadata() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("source.txt");
        let dst_file = temp_dir.path().join("nested").join("dest.txt");
        fs::write(&src_file, "test content").expect("Failed to write source");

        let bytes = copy_file_with_metadata(&src_file, &dst_file).expect("Failed to copy");
        assert_eq!(bytes, 12);
        assert_eq!(fs::read_to_string(&dst_file).expect("Failed to read dest"), "test content");
    }

    #[test]
    fn test_ensure_parent_dir_exists() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("subdir").join("file.txt");

        ensure_parent_dir_exists(&path).expect("Failed to create parent");
        assert!(path.parent().unwrap().exists());
    }
}
