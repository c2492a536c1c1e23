//! Request-scoped temporary workspaces
//!
//! Every extraction gets its own directory under the configured root, named
//! with a fixed prefix plus a random suffix. The directory is removed exactly
//! once: either through [`Workspace::close`], which the caller awaits, or when
//! the value is dropped, in which case removal is handed to the blocking pool.
//! Removal errors are logged and otherwise ignored.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

/// Exclusively owned temporary directory for one request
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a uniquely named directory `<root>/<prefix><random>`.
    pub fn create(root: &Path, prefix: &str) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(root)?;
        let path = dir.path().to_path_buf();

        debug!(workspace = %path.display(), "Workspace created");

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// [`Workspace::create`] on the blocking pool.
    pub async fn create_async(root: PathBuf, prefix: String) -> io::Result<Self> {
        tokio::task::spawn_blocking(move || Self::create(&root, &prefix))
            .await
            .map_err(io::Error::other)?
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the workspace and wait for the removal to finish.
    pub async fn close(mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = self.path.clone();

        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(result) => log_removal(&path, result),
            Err(e) => debug!(workspace = %path.display(), error = %e, "Workspace cleanup task failed"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = std::mem::take(&mut self.path);
        let remove = move || log_removal(&path, dir.close());

        // If the blocking task never runs, dropping the closure drops the
        // TempDir, which removes the directory as well.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(remove);
            }
            Err(_) => remove(),
        }
    }
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => debug!(workspace = %path.display(), "Workspace removed"),
        Err(e) => debug!(workspace = %path.display(), error = %e, "Workspace cleanup failed"),
    }
}
