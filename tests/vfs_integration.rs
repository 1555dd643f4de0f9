//! Exercises the VFS layer stack (`LocalFs` wrapped in `CachingFs`, fed to a
//! `ModuleLoader`) against real files on disk, since the in-crate unit tests
//! only cover each layer against an in-memory fake.

use std::fs;

use cirrus_parse::vfs::{CachingFs, FileSystem, LocalFs, ModuleLoader};
use cirrus_parse::CompileError;

fn temp_dir(name: &str) -> std::path::PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("cirrus-parse-vfs-test-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn local_fs_reads_nested_files_through_a_caching_layer() {
    let root = temp_dir("nested");
    fs::create_dir_all(root.join("lib")).unwrap();
    fs::write(root.join("lib/helpers.star"), "def helper():\n  return 1\n").unwrap();

    let fs_layer = CachingFs::wrap(Box::new(LocalFs::new(root.clone())));
    assert!(fs_layer.stat("lib/helpers.star"));
    let content = fs_layer.get("lib/helpers.star").unwrap();
    assert!(content.contains("def helper"));

    let mut loader = ModuleLoader::new(Box::new(fs_layer));
    let loaded = loader.load("lib/helpers.star").unwrap();
    assert_eq!(loaded, content);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn caching_fs_serves_stale_content_after_the_underlying_file_changes() {
    let root = temp_dir("stale");
    fs::write(root.join("a.star"), "version 1").unwrap();

    let fs_layer = CachingFs::wrap(Box::new(LocalFs::new(root.clone())));
    assert_eq!(fs_layer.get("a.star").unwrap(), "version 1");

    fs::write(root.join("a.star"), "version 2").unwrap();
    assert_eq!(fs_layer.get("a.star").unwrap(), "version 1", "first read wins per the write-once cache contract");

    fs::remove_dir_all(&root).ok();
}

#[test]
fn missing_file_surfaces_as_not_found() {
    let root = temp_dir("missing");
    let fs_layer = LocalFs::new(root.clone());
    let mut loader = ModuleLoader::new(Box::new(fs_layer));
    let err = loader.load("does-not-exist.star").unwrap_err();
    assert!(matches!(err, CompileError::NotFound(_)));
    fs::remove_dir_all(&root).ok();
}
