//! Read-only keyed byte stores
//!
//! Bundles and origin archives are both navigated as flat `key -> bytes`
//! namespaces, where a key is a relative path like `libraries/a.jar`. The
//! engine never sees the container format: a bundle may be a plain directory
//! during development and a zip archive when shipped, and the origin archive
//! is always a zip.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// A read-only, co-located key-value store of `path -> bytes`.
///
/// `read` takes `&mut self` because zip-backed stores seek within a single
/// underlying file handle.
pub trait EntryStore: Send {
    /// Read the bytes at `key`, or `None` if the store has no such entry.
    fn read(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// A store backed by a plain directory tree.
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl EntryStore for DirStore {
    fn read(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        check_key(key)?;
        match std::fs::read(self.root.join(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// A store backed by a zip archive (e.g. the origin jar).
pub struct ZipStore {
    archive: ZipArchive<File>,
    path: PathBuf,
}

impl ZipStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file).map_err(|e| StoreError::Archive(e.to_string()))?;
        Ok(Self {
            archive,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ZipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipStore").field("path", &self.path).finish()
    }
}

impl EntryStore for ZipStore {
    fn read(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        check_key(key)?;
        let mut entry = match self.archive.by_name(key) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(StoreError::Archive(e.to_string())),
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }
}

/// Open a store over `path`: a directory becomes a [`DirStore`], anything
/// else is treated as a zip archive.
pub fn open(path: &Path) -> Result<Box<dyn EntryStore>, StoreError> {
    let meta = std::fs::metadata(path)?;
    if meta.is_dir() {
        Ok(Box::new(DirStore::new(path)))
    } else {
        Ok(Box::new(ZipStore::open(path)?))
    }
}

// Keys originate from validated manifest lines, but a store is also handed
// raw resource names; reject traversal outright rather than trusting callers.
fn check_key(key: &str) -> Result<(), StoreError> {
    let escapes = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "..");
    if escapes {
        return Err(StoreError::Archive(format!("invalid key '{key}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn dir_fixture(root: &Path) {
        std::fs::create_dir_all(root.join("libraries")).unwrap();
        std::fs::write(root.join("libraries/a.jar"), b"jar bytes").unwrap();
        std::fs::write(root.join("top"), b"top bytes").unwrap();
    }

    fn zip_fixture(path: &Path) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        writer.start_file("libraries/a.jar", options).unwrap();
        writer.write_all(b"jar bytes").unwrap();
        writer.start_file("top", options).unwrap();
        writer.write_all(b"top bytes").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn dir_store_reads_present_and_absent() {
        let dir = tempdir().unwrap();
        dir_fixture(dir.path());
        let mut store = DirStore::new(dir.path());

        assert_eq!(
            store.read("libraries/a.jar").unwrap(),
            Some(b"jar bytes".to_vec())
        );
        assert_eq!(store.read("libraries/missing.jar").unwrap(), None);
    }

    #[test]
    fn zip_store_reads_present_and_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        zip_fixture(&path);
        let mut store = ZipStore::open(&path).unwrap();

        assert_eq!(
            store.read("libraries/a.jar").unwrap(),
            Some(b"jar bytes".to_vec())
        );
        assert_eq!(store.read("nope").unwrap(), None);
    }

    #[test]
    fn dir_and_zip_agree() {
        let dir = tempdir().unwrap();
        dir_fixture(dir.path());
        let zip_path = dir.path().join("bundle.zip");
        zip_fixture(&zip_path);

        let mut as_dir = open(dir.path()).unwrap();
        let mut as_zip = open(&zip_path).unwrap();
        for key in ["libraries/a.jar", "top", "missing"] {
            assert_eq!(as_dir.read(key).unwrap(), as_zip.read(key).unwrap());
        }
    }

    #[test]
    fn rejects_traversal_keys() {
        let dir = tempdir().unwrap();
        let mut store = DirStore::new(dir.path());
        for key in ["../etc/passwd", "/abs", "a//b", ""] {
            assert!(store.read(key).is_err(), "accepted '{key}'");
        }
    }

    #[test]
    fn open_on_missing_path_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(open(&dir.path().join("nope")).is_err());
    }
}
