//! Local-tree snapshot.
//!
//! Walks the target directory before anything is fetched, computing the blob
//! identity of every file and a synthesised tree identity for every
//! directory. The materialiser uses the snapshot to skip unchanged paths;
//! delta resolution uses it to satisfy `ref-delta` bases from disk.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use gitup_hash::{Hasher, ObjectId};
use gitup_object::tree::{TreeBuilder, MODE_DIR, MODE_EXEC, MODE_FILE, MODE_SYMLINK};

use crate::{FileEntry, WorktreeError};

/// What the target directory contained at startup.
#[derive(Debug)]
pub struct LocalTree {
    root: PathBuf,
    /// Regular files and symlinks, keyed by path relative to the root.
    pub files: BTreeMap<PathBuf, FileEntry>,
    /// Directories with their synthesised tree identities.
    pub directories: BTreeMap<PathBuf, FileEntry>,
}

impl LocalTree {
    /// The scanned target directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the file at `rel` already has the given identity.
    pub fn is_unchanged(&self, rel: &Path, id: &ObjectId) -> bool {
        self.files.get(rel).is_some_and(|entry| entry.id == *id)
    }

    /// Load the content of the local object with the given blob identity.
    ///
    /// Serves as the `ref-delta` base source for thin packs: the bases the
    /// server omitted are exactly the blobs it knows we have on disk.
    pub fn payload_for(&self, oid: &ObjectId) -> Option<Vec<u8>> {
        let (rel, entry) = self.files.iter().find(|(_, entry)| entry.id == *oid)?;
        let abs = self.root.join(rel);
        if entry.mode == MODE_SYMLINK {
            let dest = fs::read_link(&abs).ok()?;
            Some(dest.as_os_str().as_bytes().to_vec())
        } else {
            fs::read(&abs).ok()
        }
    }
}

/// Scan `target`. A missing directory yields an empty snapshot (the clone
/// case); a `.git` directory anywhere in the tree aborts the run.
pub fn scan(target: &Path) -> Result<LocalTree, WorktreeError> {
    let mut tree = LocalTree {
        root: target.to_path_buf(),
        files: BTreeMap::new(),
        directories: BTreeMap::new(),
    };

    match fs::symlink_metadata(target) {
        Ok(_) => {
            scan_dir(&mut tree, target, Path::new(""))?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(WorktreeError::io(target, e)),
    }

    Ok(tree)
}

/// Walk one directory, filling `tree` and returning the directory's
/// synthesised tree identity.
fn scan_dir(tree: &mut LocalTree, abs: &Path, rel: &Path) -> Result<ObjectId, WorktreeError> {
    let mut builder = TreeBuilder::new();

    let entries = fs::read_dir(abs).map_err(|e| WorktreeError::io(abs, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| WorktreeError::io(abs, e))?;
        let name = entry.file_name();
        if name == ".git" {
            return Err(WorktreeError::GitDirPresent(abs.join(name)));
        }

        let child_abs = abs.join(&name);
        let child_rel = rel.join(&name);
        let meta =
            fs::symlink_metadata(&child_abs).map_err(|e| WorktreeError::io(&child_abs, e))?;
        let file_type = meta.file_type();

        if file_type.is_dir() {
            let id = scan_dir(tree, &child_abs, &child_rel)?;
            tree.directories
                .insert(child_rel, FileEntry { mode: MODE_DIR, id });
            builder.push(MODE_DIR, name.as_bytes(), id);
        } else if file_type.is_symlink() {
            // Hashed over the link target, like a blob holding the target
            // path, so an unchanged link is recognised on the next run.
            let dest = fs::read_link(&child_abs).map_err(|e| WorktreeError::io(&child_abs, e))?;
            let id = Hasher::hash_object("blob", dest.as_os_str().as_bytes());
            tree.files.insert(
                child_rel,
                FileEntry {
                    mode: MODE_SYMLINK,
                    id,
                },
            );
            builder.push(MODE_SYMLINK, name.as_bytes(), id);
        } else {
            let contents = fs::read(&child_abs).map_err(|e| WorktreeError::io(&child_abs, e))?;
            let id = Hasher::hash_object("blob", &contents);
            let mode = if meta.permissions().mode() & 0o111 != 0 {
                MODE_EXEC
            } else {
                MODE_FILE
            };
            tree.files.insert(child_rel, FileEntry { mode, id });
            builder.push(mode, name.as_bytes(), id);
        }
    }

    Ok(Hasher::hash_object("tree", &builder.into_payload()))
}
