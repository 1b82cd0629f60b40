//! File access abstraction.
//!
//! The decoding layers never open files themselves; they take byte buffers.
//! Entry points that do touch files accept anything implementing
//! [`FileReader`], so a cluster can be read from a local directory, from
//! memory, or from an arbitrary fetch primitive.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Reads whole files addressed by a path relative to the cluster root
/// (for example `"global/1262"` or `"base/16384/2619"`).
pub trait FileReader {
    /// Reads the file at `path` into memory.
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Returns true if the file exists and is readable.
    fn exists(&self, path: &str) -> bool {
        self.read(path).is_ok()
    }
}

/// A [`FileReader`] rooted at a local cluster directory.
#[derive(Debug, Clone)]
pub struct DirReader {
    root: PathBuf,
}

impl DirReader {
    /// Creates a reader rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the cluster root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileReader for DirReader {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(path))
    }

    fn exists(&self, path: &str) -> bool {
        self.root.join(path).is_file()
    }
}

/// Adapts any read closure into a [`FileReader`], so a cluster can be
/// served from memory, an archive, or a remote fetch primitive.
pub struct FnReader<F>(pub F);

impl<F> FileReader for FnReader<F>
where
    F: Fn(&str) -> io::Result<Vec<u8>>,
{
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        (self.0)(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_reader() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("global")).unwrap();
        fs::write(dir.path().join("global/1262"), b"catalog").unwrap();

        let reader = DirReader::new(dir.path());
        assert_eq!(reader.read("global/1262").unwrap(), b"catalog");
        assert!(reader.exists("global/1262"));
        assert!(!reader.exists("global/9999"));
        assert!(reader.read("global/9999").is_err());
    }

    #[test]
    fn test_closure_reader() {
        let reader = FnReader(|path: &str| -> io::Result<Vec<u8>> {
            if path == "global/pg_control" {
                Ok(vec![1, 2, 3])
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()))
            }
        });
        assert_eq!(reader.read("global/pg_control").unwrap(), vec![1, 2, 3]);
        assert!(!reader.exists("base/1/1259"));
    }
}
