//! End-to-end behavior of snapshot + checkout + manifest across runs.

use std::fs;
use std::path::{Path, PathBuf};

use gitup_hash::ObjectId;
use gitup_object::tree::{TreeBuilder, MODE_DIR, MODE_FILE};
use gitup_object::ObjectKind;
use gitup_pack::ObjectStore;
use gitup_worktree::manifest::Manifest;
use gitup_worktree::{materialize, snapshot, WorktreeError};

fn build_store() -> (ObjectStore, ObjectId) {
    let mut store = ObjectStore::new();
    let readme = store.insert_object(ObjectKind::Blob, b"docs\n".to_vec());
    let code = store.insert_object(ObjectKind::Blob, b"fn main() {}\n".to_vec());

    let mut src = TreeBuilder::new();
    src.push(MODE_FILE, "main.rs".as_bytes(), code);
    let src_tree = store.insert_object(ObjectKind::Tree, src.into_payload());

    let mut root = TreeBuilder::new();
    root.push(MODE_FILE, "README".as_bytes(), readme);
    root.push(MODE_DIR, "src".as_bytes(), src_tree);
    let root_tree = store.insert_object(ObjectKind::Tree, root.into_payload());

    let commit = store.insert_object(
        ObjectKind::Commit,
        format!(
            "tree {root_tree}\nauthor A <a@a> 0 +0000\ncommitter A <a@a> 0 +0000\n\nmsg\n"
        )
        .into_bytes(),
    );
    (store, commit)
}

/// One full run: snapshot, checkout, manifest install.
fn run(store: &ObjectStore, want: ObjectId, target: &Path, state: &Path) -> usize {
    let snap = snapshot::scan(target).unwrap();
    if let Some(manifest) = Manifest::load(state).unwrap() {
        manifest.verify(&snap).unwrap();
    }
    let mut writes = 0;
    let files = materialize::checkout(store, want, &snap, |_, _| writes += 1).unwrap();
    Manifest::new(want, files).install(state).unwrap();
    writes
}

#[test]
fn clone_then_noop_pull_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("tree");
    let state = dir.path().join("state");
    let (store, want) = build_store();

    let first = run(&store, want, &target, &state);
    assert_eq!(first, 2); // README and src/main.rs
    assert_eq!(fs::read(target.join("README")).unwrap(), b"docs\n");
    assert_eq!(fs::read(target.join("src/main.rs")).unwrap(), b"fn main() {}\n");

    // Second run against the same commit: zero file writes.
    let second = run(&store, want, &target, &state);
    assert_eq!(second, 0);

    let manifest = Manifest::load(&state).unwrap().unwrap();
    assert_eq!(manifest.commit, want);
}

#[test]
fn repeated_runs_write_identical_manifests() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("tree");
    let state_a = dir.path().join("a");
    let state_b = dir.path().join("b");
    let (store, want) = build_store();

    run(&store, want, &target, &state_a);
    run(&store, want, &target, &state_b);

    assert_eq!(fs::read(&state_a).unwrap(), fs::read(&state_b).unwrap());
}

#[test]
fn locally_modified_file_blocks_the_pull() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("tree");
    let state = dir.path().join("state");
    let (store, want) = build_store();

    run(&store, want, &target, &state);
    fs::write(target.join("README"), b"scribbled over\n").unwrap();

    let snap = snapshot::scan(&target).unwrap();
    let manifest = Manifest::load(&state).unwrap().unwrap();
    let err = manifest.verify(&snap).unwrap_err();
    match err {
        WorktreeError::LocalTreeCorrupt { path, .. } => {
            assert_eq!(path, PathBuf::from("README"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn deleted_file_blocks_the_pull() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("tree");
    let state = dir.path().join("state");
    let (store, want) = build_store();

    run(&store, want, &target, &state);
    fs::remove_file(target.join("src/main.rs")).unwrap();

    let snap = snapshot::scan(&target).unwrap();
    let manifest = Manifest::load(&state).unwrap().unwrap();
    let err = manifest.verify(&snap).unwrap_err();
    assert!(matches!(err, WorktreeError::LocalTreeCorrupt { path, .. }
        if path == PathBuf::from("src/main.rs")));
}

#[test]
fn manifest_matches_what_is_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("tree");
    let state = dir.path().join("state");
    let (store, want) = build_store();

    run(&store, want, &target, &state);

    let manifest = Manifest::load(&state).unwrap().unwrap();
    assert_eq!(manifest.files.len(), 2);
    let snap = snapshot::scan(&target).unwrap();
    for (path, entry) in &manifest.files {
        assert_eq!(snap.files.get(path).unwrap().id, entry.id);
    }
}
