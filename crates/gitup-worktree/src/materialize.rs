//! Tree materialisation: writing a commit's tree into the target directory.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use gitup_hash::ObjectId;
use gitup_object::commit;
use gitup_object::tree::TreeIter;
use gitup_pack::ObjectStore;

use crate::snapshot::LocalTree;
use crate::{FileEntry, WorktreeError};

/// Materialise the tree of commit `want` into the snapshot's root directory.
///
/// Paths whose snapshot identity already matches are left untouched.
/// `on_write` is invoked for every path actually written, with `true` for a
/// newly created file. Returns every tracked file of the commit (written or
/// skipped), ready to become the new remote-state manifest.
pub fn checkout(
    store: &ObjectStore,
    want: ObjectId,
    snapshot: &LocalTree,
    mut on_write: impl FnMut(&Path, bool),
) -> Result<BTreeMap<PathBuf, FileEntry>, WorktreeError> {
    let commit_record = store
        .get(&want)
        .ok_or(WorktreeError::MissingObject(want))?;
    let root_tree = commit::root_tree(&commit_record.payload)?;

    let target = snapshot.root().to_path_buf();
    create_dir(&target)?;

    let mut files = BTreeMap::new();
    walk_tree(
        store,
        root_tree,
        &target,
        Path::new(""),
        snapshot,
        &mut files,
        &mut on_write,
    )?;
    Ok(files)
}

fn walk_tree(
    store: &ObjectStore,
    tree_id: ObjectId,
    abs_dir: &Path,
    rel_dir: &Path,
    snapshot: &LocalTree,
    files: &mut BTreeMap<PathBuf, FileEntry>,
    on_write: &mut impl FnMut(&Path, bool),
) -> Result<(), WorktreeError> {
    let record = store
        .get(&tree_id)
        .ok_or(WorktreeError::MissingObject(tree_id))?;

    for entry in TreeIter::new(&record.payload) {
        let entry = entry?;
        let name = OsStr::from_bytes(entry.name);
        let abs = abs_dir.join(name);
        let rel = rel_dir.join(name);

        if entry.is_dir() {
            create_dir(&abs)?;
            walk_tree(store, entry.oid, &abs, &rel, snapshot, files, on_write)?;
            continue;
        }

        files.insert(
            rel.clone(),
            FileEntry {
                mode: entry.mode,
                id: entry.oid,
            },
        );
        if snapshot.is_unchanged(&rel, &entry.oid) {
            continue;
        }

        let blob = store
            .get(&entry.oid)
            .ok_or(WorktreeError::MissingObject(entry.oid))?;

        if entry.is_symlink() {
            // The blob payload is the link target.
            let dest = Path::new(OsStr::from_bytes(&blob.payload));
            let existed = fs::symlink_metadata(&abs).is_ok();
            if existed {
                fs::remove_file(&abs).map_err(|e| WorktreeError::io(&abs, e))?;
            }
            symlink(dest, &abs).map_err(|e| WorktreeError::io(&abs, e))?;
            on_write(&rel, !existed);
        } else {
            let existed = abs.exists();
            fs::write(&abs, &blob.payload).map_err(|e| WorktreeError::io(&abs, e))?;
            fs::set_permissions(&abs, fs::Permissions::from_mode(entry.mode & 0o7777))
                .map_err(|e| WorktreeError::io(&abs, e))?;
            on_write(&rel, !existed);
        }
    }

    Ok(())
}

fn create_dir(path: &Path) -> Result<(), WorktreeError> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(WorktreeError::io(path, e)),
    }
}
