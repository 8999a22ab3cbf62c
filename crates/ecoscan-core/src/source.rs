use crate::error::{Result, ScanError};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A materialized source tree.
///
/// Trees backed by a temporary directory delete it when dropped.
#[derive(Debug)]
pub struct SourceTree {
    root: PathBuf,
    _scratch: Option<TempDir>,
}

impl SourceTree {
    /// A tree the caller owns; it is never deleted.
    pub fn borrowed(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            _scratch: None,
        }
    }

    /// A tree living in `scratch`, deleted with it.
    pub fn scratch(scratch: TempDir, root: PathBuf) -> Self {
        Self {
            root,
            _scratch: Some(scratch),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Produces the tree a pipeline run analyzes.
pub trait SourceProvider: Send + 'static {
    /// Blocking; called from a worker thread.
    fn materialize(&self) -> Result<SourceTree>;

    fn describe(&self) -> String;
}

/// An already checked-out directory.
#[derive(Debug, Clone)]
pub struct LocalSource {
    path: PathBuf,
}

impl LocalSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceProvider for LocalSource {
    fn materialize(&self) -> Result<SourceTree> {
        if !self.path.is_dir() {
            return Err(ScanError::SourceTree(self.path.clone()));
        }
        Ok(SourceTree::borrowed(self.path.clone()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A remote repository shallow-cloned into a temporary directory.
#[derive(Debug, Clone)]
pub struct GitSource {
    url: String,
}

impl GitSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl SourceProvider for GitSource {
    fn materialize(&self) -> Result<SourceTree> {
        let scratch = tempfile::Builder::new().prefix("ecoscan-").tempdir()?;
        let checkout = scratch.path().join("repo");
        tracing::info!(url = %self.url, dest = %checkout.display(), "cloning repository");

        let output = Command::new("git")
            .args(["clone", "--depth", "1", "--quiet", "--"])
            .arg(&self.url)
            .arg(&checkout)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| ScanError::Source(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::Source(format!(
                "failed to clone '{}': {}",
                self.url,
                stderr.trim()
            )));
        }

        Ok(SourceTree::scratch(scratch, checkout))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_source_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tree = LocalSource::new(dir.path()).materialize().unwrap();
        assert_eq!(tree.root(), dir.path());

        let missing = LocalSource::new(dir.path().join("missing"));
        assert!(matches!(missing.materialize(), Err(ScanError::SourceTree(_))));
    }

    #[test]
    fn test_borrowed_tree_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        drop(SourceTree::borrowed(dir.path()));
        assert!(dir.path().exists());
    }

    #[test]
    fn test_scratch_tree_deleted_on_drop() {
        let scratch = tempfile::tempdir().unwrap();
        let root = scratch.path().join("repo");
        std::fs::create_dir_all(&root).unwrap();
        let tree = SourceTree::scratch(scratch, root.clone());
        assert!(tree.root().exists());
        drop(tree);
        assert!(!root.exists());
    }

    #[test]
    fn test_clone_failure_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("not-a-repo");
        let result = GitSource::new(bogus.display().to_string()).materialize();
        assert!(matches!(result, Err(ScanError::Source(_))));
    }
}
