// SPDX-License-Identifier: MIT

//! Single-instance guard: one orchestrator process per project directory.
//!
//! Mirrors the daemon lock pattern used elsewhere in this codebase — an
//! exclusive `flock` on a PID file inside the project directory, held for
//! the lifetime of the process and released automatically on drop or
//! crash by the OS.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ProjectLock {
    path: PathBuf,
    file: File,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another orchestrator already holds the lock at {0}")]
    AlreadyLocked(PathBuf),
    #[error("io error acquiring lock at {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

impl ProjectLock {
    /// Acquires `<project_dir>/.pao.lock`, creating the directory if
    /// needed. Fails immediately (no blocking wait) if another process
    /// already holds it.
    pub fn acquire(project_dir: &Path) -> Result<Self, LockError> {
        std::fs::create_dir_all(project_dir)
            .map_err(|source| LockError::Io { path: project_dir.to_path_buf(), source })?;
        let path = project_dir.join(".pao.lock");

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Io { path: path.clone(), source })?;
        file.try_lock_exclusive().map_err(|_| LockError::AlreadyLocked(path.clone()))?;

        file.set_len(0).map_err(|source| LockError::Io { path: path.clone(), source })?;
        writeln!(file, "{}", std::process::id())
            .map_err(|source| LockError::Io { path: path.clone(), source })?;

        Ok(Self { path, file })
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
