//! Atomic file installation.
//!
//! New contents are written to `<path>.new` and renamed over the target on
//! commit, so the old file survives any failure in between. The lock file is
//! removed on drop if never committed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::WorktreeError;

const LOCK_SUFFIX: &str = ".new";

/// RAII guard for replacing a file atomically.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl LockFile {
    /// Start writing a replacement for `path`. Fails if a replacement is
    /// already in progress.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, WorktreeError> {
        let path = path.as_ref().to_path_buf();
        let lock_path = PathBuf::from(format!("{}{}", path.display(), LOCK_SUFFIX));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    WorktreeError::AlreadyLocked(lock_path.clone())
                } else {
                    WorktreeError::io(&lock_path, e)
                }
            })?;

        Ok(Self {
            path,
            lock_path,
            file: Some(file),
            committed: false,
        })
    }

    /// Flush, sync, and rename over the target.
    pub fn commit(mut self) -> Result<(), WorktreeError> {
        if let Some(file) = self.file.as_mut() {
            file.flush().map_err(|e| WorktreeError::io(&self.lock_path, e))?;
            file.sync_all()
                .map_err(|e| WorktreeError::io(&self.lock_path, e))?;
        }
        self.file.take();

        fs::rename(&self.lock_path, &self.path)
            .map_err(|e| WorktreeError::io(&self.path, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .flush()
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
