//! Per-run scratch directories.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::ExecutionConfig;
use crate::errors::ExecutionError;
use crate::toolchain::LanguagePipeline;

/// An exclusively owned directory holding one run's source file and
/// compiled artifact.
///
/// The directory is removed by [`Workspace::destroy`] or, failing that, when
/// the value is dropped. Removal never fails from the caller's point of view.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `root` (the system temp
    /// dir when `None`).
    pub fn create(root: Option<&Path>, prefix: &str) -> Result<Self, ExecutionError> {
        let mut builder = Builder::new();
        builder.prefix(prefix);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| ExecutionError::Workspace(format!("failed to create scratch dir: {}", e)))?;

        let path = dir.path().to_path_buf();
        log::debug!("Created workspace {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn for_config(config: &ExecutionConfig) -> Result<Self, ExecutionError> {
        Self::create(config.scratch_root.as_deref(), &config.workspace_prefix)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `content` at the pipeline's fixed source file name.
    pub async fn write_source(
        &self,
        pipeline: &LanguagePipeline,
        content: &str,
    ) -> Result<PathBuf, ExecutionError> {
        let source_path = self.path.join(&pipeline.source_file);
        let mut file = fs::File::create(&source_path).await.map_err(|e| {
            ExecutionError::Workspace(format!("failed to write {}: {}", pipeline.source_file, e))
        })?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(source_path)
    }

    /// Remove the directory and everything in it.
    ///
    /// Idempotent. A directory that is already gone is fine; any other
    /// failure is logged and swallowed.
    pub fn destroy(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => log::debug!("Removed workspace {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove workspace {}: {}", self.path.display(), e),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.dir.is_none()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::ToolchainRegistry;
    use std::collections::HashSet;

    #[test]
    fn test_create_uses_prefix_and_root() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(Some(root.path()), "code_run_").unwrap();
        assert!(ws.path().starts_with(root.path()));
        let name = ws.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("code_run_"));
        assert!(ws.path().is_dir());
    }

    #[test]
    fn test_paths_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let workspaces: Vec<_> = (0..16)
            .map(|_| Workspace::create(Some(root.path()), "code_run_").unwrap())
            .collect();
        let paths: HashSet<_> = workspaces.iter().map(|w| w.path().to_path_buf()).collect();
        assert_eq!(paths.len(), workspaces.len());
    }

    #[tokio::test]
    async fn test_write_source_uses_pipeline_file_name() {
        let registry = ToolchainRegistry::new();
        let java = registry.resolve("java").unwrap();
        let ws = Workspace::create(None, "code_run_").unwrap();
        let path = ws.write_source(java, "class Main {}").await.unwrap();
        assert_eq!(path, ws.path().join("Main.java"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "class Main {}");
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut ws = Workspace::create(None, "code_run_").unwrap();
        let path = ws.path().to_path_buf();
        ws.destroy();
        assert!(!path.exists());
        assert!(ws.is_destroyed());
        ws.destroy();
    }

    #[test]
    fn test_destroy_tolerates_prior_removal() {
        let mut ws = Workspace::create(None, "code_run_").unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();
        ws.destroy();
        assert!(ws.is_destroyed());
    }

    #[test]
    fn test_drop_removes_directory() {
        let path = {
            let ws = Workspace::create(None, "code_run_").unwrap();
            std::fs::write(ws.path().join("a.out"), b"bin").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_root_is_a_workspace_error() {
        let err = Workspace::create(Some(Path::new("/nonexistent/root")), "code_run_").unwrap_err();
        assert_eq!(err.kind(), "workspace_error");
    }
}
