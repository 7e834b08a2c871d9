//! The working-tree side of gitup: scanning what is already on disk,
//! materialising a commit's tree into the target directory, and tracking the
//! result in the remote-state manifest.

pub mod lockfile;
pub mod manifest;
pub mod materialize;
pub mod snapshot;

use std::path::PathBuf;

use gitup_hash::ObjectId;

/// Errors that can occur while scanning or writing the working tree.
#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    #[error(
        "a .git directory exists at {0}; gitup would damage a real working copy, remove it first"
    )]
    GitDirPresent(PathBuf),

    #[error("local tree no longer matches the last recorded state: {path}: {reason}")]
    LocalTreeCorrupt { path: PathBuf, reason: String },

    #[error("remote-state file {file}:{line}: {message}")]
    MalformedManifest {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("object {0} is not present in the store")]
    MissingObject(ObjectId),

    #[error("lock file {0} already exists; remove it if no other gitup is running")]
    AlreadyLocked(PathBuf),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Object(#[from] gitup_object::ObjectError),
}

impl WorktreeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Mode and identity of one tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEntry {
    /// POSIX mode bits as they appear in tree entries.
    pub mode: u32,
    pub id: ObjectId,
}
