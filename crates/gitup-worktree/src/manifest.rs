//! The remote-state manifest.
//!
//! One plain-text file per configured section, recording what the last
//! successful run put on disk: the commit id on line 1, then one
//! `<octal-mode>\t<40-hex-id>\t<path>` line per tracked file, sorted by
//! path. The next run reads it to learn its `have` and to detect local
//! modifications before touching anything.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use gitup_hash::ObjectId;

use crate::lockfile::LockFile;
use crate::snapshot::LocalTree;
use crate::{FileEntry, WorktreeError};

/// Parsed remote-state file.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// The commit the tree on disk corresponds to.
    pub commit: ObjectId,
    /// Tracked files, keyed by path relative to the target root.
    pub files: BTreeMap<PathBuf, FileEntry>,
}

impl Manifest {
    pub fn new(commit: ObjectId, files: BTreeMap<PathBuf, FileEntry>) -> Self {
        Self { commit, files }
    }

    /// Load the manifest at `path`; `Ok(None)` if none exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>, WorktreeError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WorktreeError::io(path, e)),
        };

        let malformed = |line: usize, message: String| WorktreeError::MalformedManifest {
            file: path.to_path_buf(),
            line,
            message,
        };

        let mut lines = text.lines().enumerate();
        let (_, first) = lines
            .next()
            .ok_or_else(|| malformed(1, "empty remote-state file".into()))?;
        let commit = ObjectId::from_hex(first.trim())
            .map_err(|e| malformed(1, format!("bad commit id: {e}")))?;

        let mut files = BTreeMap::new();
        for (index, line) in lines {
            if line.is_empty() {
                continue;
            }
            let mut fields = line.splitn(3, '\t');
            let (mode, id, file_path) = match (fields.next(), fields.next(), fields.next()) {
                (Some(m), Some(i), Some(p)) => (m, i, p),
                _ => return Err(malformed(index + 1, "expected mode\\tid\\tpath".into())),
            };
            let mode = u32::from_str_radix(mode, 8)
                .map_err(|_| malformed(index + 1, format!("bad octal mode {mode:?}")))?;
            let id = ObjectId::from_hex(id)
                .map_err(|e| malformed(index + 1, format!("bad id: {e}")))?;
            files.insert(PathBuf::from(file_path), FileEntry { mode, id });
        }

        Ok(Some(Self { commit, files }))
    }

    /// Write the manifest to `path`, replacing any previous file only after
    /// the new one is complete.
    pub fn install(&self, path: &Path) -> Result<(), WorktreeError> {
        let mut lock = LockFile::acquire(path)?;
        let mut text = String::with_capacity(64 * (self.files.len() + 1));
        text.push_str(&self.commit.to_hex());
        text.push('\n');
        for (file_path, entry) in &self.files {
            text.push_str(&format!(
                "{:o}\t{}\t{}\n",
                entry.mode,
                entry.id,
                file_path.display()
            ));
        }
        lock.write_all(text.as_bytes())
            .map_err(|e| WorktreeError::io(path, e))?;
        lock.commit()
    }

    /// Check the local tree against this manifest before a pull.
    ///
    /// Every tracked file must still exist with the identity recorded here;
    /// the first missing or modified path aborts the run so a stray local
    /// change is never silently overwritten.
    pub fn verify(&self, snapshot: &LocalTree) -> Result<(), WorktreeError> {
        for (path, entry) in &self.files {
            match snapshot.files.get(path) {
                None => {
                    return Err(WorktreeError::LocalTreeCorrupt {
                        path: path.clone(),
                        reason: "file is missing".into(),
                    })
                }
                Some(local) if local.id != entry.id => {
                    return Err(WorktreeError::LocalTreeCorrupt {
                        path: path.clone(),
                        reason: "file has been modified".into(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
