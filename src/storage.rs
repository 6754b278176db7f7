//! Filestore: attachment bytes on disk with a soft-missing fallback.
//!
//! Metadata lives in the attachments table; this module only deals in bytes
//! keyed by `store_fname`, a sharded relative path under the filestore root.
//! When `suppress_missing` is on, a missing or unreadable file reads back as
//! [`FileContent::Missing`] with an info log instead of an error.

use std::io;
use std::path::{Path, PathBuf};

/// Display paths in logs are truncated to this many characters unless
/// `show_full_path` is set.
const MAX_PATH_LENGTH: usize = 50;

/// Filestore behavior flags, passed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStoreConfig {
    /// Treat missing or unreadable files as empty content instead of errors.
    pub suppress_missing: bool,
    /// Log full relative paths instead of truncated ones.
    pub show_full_path: bool,
}

/// A file written to the store.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Relative sharded path under the filestore root.
    pub store_fname: String,
    pub size: i64,
    /// crc32 of the content, lowercase hex.
    pub checksum: String,
}

/// Result of reading from the store.
#[derive(Debug)]
pub enum FileContent {
    Found(Vec<u8>),
    /// The file is gone and `suppress_missing` converted the error.
    Missing,
}

/// Disk-backed attachment storage.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
    config: FileStoreConfig,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, config: FileStoreConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write content under a fresh sharded name (`ab/<uuid>`). Returns the
    /// relative name, size and checksum for the metadata row.
    pub async fn write(&self, bytes: &[u8]) -> io::Result<StoredFile> {
        let name = uuid::Uuid::new_v4().simple().to_string();
        let store_fname = format!("{}/{}", &name[..2], name);

        let full_path = self.root.join(&store_fname);
        if let Some(dir) = full_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&full_path, bytes).await?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(bytes);

        Ok(StoredFile {
            store_fname,
            size: bytes.len() as i64,
            checksum: format!("{:08x}", hasher.finalize()),
        })
    }

    /// Read content back by its relative name.
    ///
    /// With `suppress_missing`, a missing file (or any other read error)
    /// becomes [`FileContent::Missing`] with an info log; otherwise the
    /// error propagates.
    pub async fn read(&self, store_fname: &str) -> io::Result<FileContent> {
        let full_path = self.root.join(store_fname);
        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(FileContent::Found(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.config.suppress_missing {
                    tracing::info!(
                        path = %self.display_path(store_fname),
                        suppress_missing = self.config.suppress_missing,
                        "File not found"
                    );
                    Ok(FileContent::Missing)
                } else {
                    Err(e)
                }
            }
            Err(e) => {
                if self.config.suppress_missing {
                    tracing::info!(
                        path = %self.display_path(store_fname),
                        error = %e,
                        "Failed to read file, returning empty content"
                    );
                    Ok(FileContent::Missing)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Relative path for log lines, truncated unless configured otherwise.
    fn display_path(&self, store_fname: &str) -> String {
        if self.config.show_full_path || store_fname.len() <= MAX_PATH_LENGTH {
            store_fname.to_string()
        } else {
            format!("{}...", &store_fname[..MAX_PATH_LENGTH])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path, suppress_missing: bool) -> FileStore {
        FileStore::new(
            dir,
            FileStoreConfig {
                suppress_missing,
                show_full_path: false,
            },
        )
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let fs = store(dir.path(), false);

        let stored = fs.write(b"hello world").await.unwrap();
        assert_eq!(stored.size, 11);
        assert_eq!(stored.checksum.len(), 8);
        // Sharded layout: two-char prefix directory.
        assert_eq!(&stored.store_fname[2..3], "/");

        match fs.read(&stored.store_fname).await.unwrap() {
            FileContent::Found(bytes) => assert_eq!(bytes, b"hello world"),
            FileContent::Missing => panic!("expected content"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_errors_without_suppression() {
        let dir = tempfile::tempdir().unwrap();
        let fs = store(dir.path(), false);

        let err = fs.read("ab/absent").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_missing_file_soft_with_suppression() {
        let dir = tempfile::tempdir().unwrap();
        let fs = store(dir.path(), true);

        match fs.read("ab/absent").await.unwrap() {
            FileContent::Missing => {}
            FileContent::Found(_) => panic!("expected missing"),
        }
    }

    #[tokio::test]
    async fn test_checksum_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let fs = store(dir.path(), false);

        let a = fs.write(b"same content").await.unwrap();
        let b = fs.write(b"same content").await.unwrap();
        assert_eq!(a.checksum, b.checksum);
        assert_ne!(a.store_fname, b.store_fname);
    }

    #[test]
    fn test_display_path_truncation() {
        let long = "x".repeat(80);
        let fs = store(Path::new("/tmp"), true);
        let truncated = fs.display_path(&long);
        assert_eq!(truncated.len(), MAX_PATH_LENGTH + 3);
        assert!(truncated.ends_with("..."));

        let full = FileStore::new(
            "/tmp",
            FileStoreConfig {
                suppress_missing: true,
                show_full_path: true,
            },
        );
        assert_eq!(full.display_path(&long), long);
    }
}
