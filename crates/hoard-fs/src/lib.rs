//! Crash-safe filesystem primitives.
//!
//! - [`atomic_write`] replaces a whole file through a sibling temporary and a
//!   rename, so readers observe either the old or the new content.
//! - [`file_len`] reports the on-disk size of a partial download, which is the
//!   only resume state the mirror keeps.
//! - [`remove_if_exists`] discards a file without failing on absence.

mod error;

pub use error::{Error, Result};

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

#[derive(Clone, Copy, Debug)]
pub struct AtomicWriteOptions {
    sync:   bool,
    prefix: &'static str,
    suffix: &'static str,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self { Self::new() }
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self {
            sync:   true,
            prefix: ".",
            suffix: ".tmp",
        }
    }

    /// Flush the temporary file and its directory to stable storage.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn suffix(mut self, suffix: &'static str) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn is_sync(&self) -> bool { self.sync }
}

/// Replace `path` with `content` in one rename.
///
/// The temporary lives next to the target so the rename never crosses a
/// filesystem. On failure the temporary is removed and the previous content
/// of `path` is untouched.
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8], options: AtomicWriteOptions) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => return Err(Error::NoParent { path: path.to_path_buf() }),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(options.prefix)
        .suffix(options.suffix)
        .tempfile_in(parent)
        .map_err(|e| Error::Write {
            path:   parent.to_path_buf(),
            source: e,
        })?;

    let write_err = |e| Error::Write {
        path:   tmp_path_of(path),
        source: e,
    };
    tmp.write_all(content).map_err(write_err)?;
    if options.sync {
        tmp.as_file().sync_all().map_err(write_err)?;
    }

    // Dropping the PersistError removes the temporary.
    tmp.persist(path).map_err(|e| Error::Write {
        path:   path.to_path_buf(),
        source: e.error,
    })?;

    if options.sync {
        sync_dir(parent)?;
    }
    Ok(())
}

pub fn atomic_read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| Error::Read {
        path:   path.to_path_buf(),
        source: e,
    })
}

/// Like [`atomic_read`] but maps a missing file to `None`.
pub fn read_if_exists(path: impl AsRef<Path>) -> Result<Option<Vec<u8>>> {
    let path = path.as_ref();
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Read {
            path:   path.to_path_buf(),
            source: e,
        }),
    }
}

/// Current size of `path`, or 0 when it does not exist.
pub fn file_len(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(Error::Read {
            path:   path.to_path_buf(),
            source: e,
        }),
    }
}

/// Returns whether a file was actually removed.
pub fn remove_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Remove {
            path:   path.to_path_buf(),
            source: e,
        }),
    }
}

fn tmp_path_of(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::Write {
            path:   dir.to_path_buf(),
            source: e,
        })
}

// Directory handles cannot be fsynced on this platform; the rename itself is
// the durability point.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> { Ok(()) }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");
        atomic_write(&path, b"hello world", AtomicWriteOptions::new()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello world");
    }

    #[test]
    fn test_atomic_write_leaves_no_temporaries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        atomic_write(&path, b"{}", AtomicWriteOptions::new()).unwrap();
        atomic_write(&path, b"{\"a\":1}", AtomicWriteOptions::new().sync(false)).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("ledger.json")]);
    }

    #[test]
    fn test_atomic_write_into_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("file");
        let err = atomic_write(&path, b"x", AtomicWriteOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_file_len_missing_is_zero() {
        let dir = tempdir().unwrap();
        assert_eq!(file_len(dir.path().join("nope")).unwrap(), 0);

        let path = dir.path().join("part");
        fs::write(&path, [0u8; 17]).unwrap();
        assert_eq!(file_len(&path).unwrap(), 17);
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone");
        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, b"x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_read_if_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("maybe");
        assert!(read_if_exists(&path).unwrap().is_none());
        fs::write(&path, b"abc").unwrap();
        assert_eq!(read_if_exists(&path).unwrap().unwrap(), b"abc");
    }
}
