//! Repository source collaborator: file tree plus per-file content + hash.
//!
//! Acquisition (cloning, checkouts) happens outside this system; the
//! pipeline only consumes this trait. The filesystem implementation serves
//! repositories registered as local directories and ignores `branch` — the
//! checked-out tree is whatever the acquisition side put on disk.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::RwLock;

use crate::error::IndexError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One file's content with its fingerprint.
#[derive(Debug, Clone)]
pub struct SourceFileContent {
    pub bytes: Vec<u8>,
    /// blake3 hex digest of `bytes`.
    pub hash: String,
}

pub trait RepositorySource: Send + Sync {
    /// Relative paths of all indexable files, ignore patterns honored.
    fn list_files(
        &self,
        repository_id: &str,
        branch: &str,
    ) -> BoxFuture<'_, Result<Vec<String>, IndexError>>;

    fn read_file(
        &self,
        repository_id: &str,
        branch: &str,
        rel_path: &str,
    ) -> BoxFuture<'_, Result<SourceFileContent, IndexError>>;
}

/// Filesystem-backed source over registered repository roots.
#[derive(Debug, Default)]
pub struct FsRepositorySource {
    roots: RwLock<HashMap<String, PathBuf>>,
}

impl FsRepositorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-point) a repository root directory.
    pub fn register(&self, repository_id: &str, root: impl Into<PathBuf>) {
        if let Ok(mut roots) = self.roots.write() {
            roots.insert(repository_id.to_owned(), root.into());
        }
    }

    fn root_of(&self, repository_id: &str) -> Result<PathBuf, IndexError> {
        let root = self
            .roots
            .read()
            .ok()
            .and_then(|r| r.get(repository_id).cloned())
            .ok_or_else(|| {
                IndexError::NotFound(format!("repository {repository_id} is not registered"))
            })?;
        if !root.is_dir() {
            return Err(IndexError::RepositoryUnavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(root)
    }
}

impl RepositorySource for FsRepositorySource {
    fn list_files(
        &self,
        repository_id: &str,
        _branch: &str,
    ) -> BoxFuture<'_, Result<Vec<String>, IndexError>> {
        let repository_id = repository_id.to_owned();
        Box::pin(async move {
            let root = self.root_of(&repository_id)?;

            let mut files: Vec<String> = ignore::WalkBuilder::new(&root)
                .hidden(true)
                .git_ignore(true)
                .build()
                .flatten()
                .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
                .filter_map(|e| {
                    e.path()
                        .strip_prefix(&root)
                        .ok()
                        .map(|p| p.to_string_lossy().into_owned())
                })
                .collect();
            files.sort();
            Ok(files)
        })
    }

    fn read_file(
        &self,
        repository_id: &str,
        _branch: &str,
        rel_path: &str,
    ) -> BoxFuture<'_, Result<SourceFileContent, IndexError>> {
        let repository_id = repository_id.to_owned();
        let rel_path = rel_path.to_owned();
        Box::pin(async move {
            let root = self.root_of(&repository_id)?;
            let bytes = tokio::fs::read(root.join(&rel_path)).await?;
            let hash = blake3::hash(&bytes).to_hex().to_string();
            Ok(SourceFileContent { bytes, hash })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &std::path::Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn lists_files_relative_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/lib.rs", "fn a() {}");
        write(dir.path(), "README.md", "# readme");

        let source = FsRepositorySource::new();
        source.register("r1", dir.path());

        let files = source.list_files("r1", "main").await.unwrap();
        assert_eq!(files, vec!["README.md".to_string(), "src/lib.rs".to_string()]);
    }

    #[tokio::test]
    async fn honors_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".gitignore", "target/\n");
        write(dir.path(), "target/debug/out.rs", "ignored");
        write(dir.path(), "src/lib.rs", "fn a() {}");

        let source = FsRepositorySource::new();
        source.register("r1", dir.path());

        let files = source.list_files("r1", "main").await.unwrap();
        assert!(files.iter().any(|f| f == "src/lib.rs"));
        assert!(!files.iter().any(|f| f.starts_with("target/")));
    }

    #[tokio::test]
    async fn read_file_hashes_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "same content");
        write(dir.path(), "b.txt", "same content");
        write(dir.path(), "c.txt", "different");

        let source = FsRepositorySource::new();
        source.register("r1", dir.path());

        let a = source.read_file("r1", "main", "a.txt").await.unwrap();
        let b = source.read_file("r1", "main", "b.txt").await.unwrap();
        let c = source.read_file("r1", "main", "c.txt").await.unwrap();
        assert_eq!(a.hash, b.hash);
        assert_ne!(a.hash, c.hash);
    }

    #[tokio::test]
    async fn unregistered_repository_is_not_found() {
        let source = FsRepositorySource::new();
        let err = source.list_files("ghost", "main").await.unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_root_is_unavailable() {
        let source = FsRepositorySource::new();
        source.register("r1", "/nonexistent/path/xyz");
        let err = source.list_files("r1", "main").await.unwrap_err();
        assert!(matches!(err, IndexError::RepositoryUnavailable(_)));
    }
}
