use std::fs;

use super::*;

fn tree() -> (tempfile::TempDir, FileTree) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    (dir, FileTree::new(root))
}

#[test]
fn list_rejects_path_outside_root() {
    let (_dir, tree) = tree();
    let err = tree.list("../other", 2).unwrap_err();
    assert_eq!(err.message(), "Path traversal not allowed");
}

#[test]
fn list_sorts_directories_before_files_then_alphabetically() {
    let (dir, tree) = tree();
    fs::write(dir.path().join("b.txt"), "b").unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::create_dir(dir.path().join("zdir")).unwrap();

    let nodes = tree.list(".", 1).unwrap();
    assert_eq!(nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(), vec!["zdir", "a.txt", "b.txt"]);
}

#[test]
fn list_drops_ignored_entries_and_recurses_to_depth() {
    let (dir, tree) = tree();
    fs::create_dir(dir.path().join("node_modules")).unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src").join("main.rs"), "fn main() {}").unwrap();

    let nodes = tree.list(".", 1).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "src");
    assert_eq!(nodes[0].children.len(), 1);
    assert_eq!(nodes[0].children[0].name, "main.rs");
}

#[test]
fn list_skips_unreadable_subdirectories_without_erroring() {
    let (dir, tree) = tree();
    let blocked = dir.path().join("blocked");
    fs::create_dir(&blocked).unwrap();
    let mut perms = fs::metadata(&blocked).unwrap().permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o000);
    fs::set_permissions(&blocked, perms.clone()).unwrap();

    let result = tree.list(".", 2);

    let mut restore = perms;
    std::os::unix::fs::PermissionsExt::set_mode(&mut restore, 0o755);
    fs::set_permissions(&blocked, restore).unwrap();

    assert!(result.is_ok());
}

#[test]
fn read_classifies_images_as_base64_readonly() {
    let (dir, tree) = tree();
    fs::write(dir.path().join("pic.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

    match tree.read("pic.png").unwrap() {
        FileReadResult::Base64 { mime_type, readonly, .. } => {
            assert_eq!(mime_type, "image/png");
            assert!(readonly);
        }
        other => panic!("expected base64 result, got {other:?}"),
    }
}

#[test]
fn read_classifies_text_with_language_and_plain_mime() {
    let (dir, tree) = tree();
    fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

    match tree.read("main.rs").unwrap() {
        FileReadResult::Utf8 { content, language, mime_type } => {
            assert_eq!(content, "fn main() {}");
            assert_eq!(language, "rust");
            assert_eq!(mime_type, "text/plain");
        }
        other => panic!("expected utf-8 result, got {other:?}"),
    }
}

#[test]
fn write_creates_parent_dirs_and_reports_size() {
    let (dir, tree) = tree();
    let size = tree.write("nested/dir/file.txt", "hello").unwrap();
    assert_eq!(size, 5);
    assert_eq!(fs::read_to_string(dir.path().join("nested/dir/file.txt")).unwrap(), "hello");
}

#[test]
fn read_rejects_traversal_via_dotdot() {
    let (dir, tree) = tree();
    fs::write(dir.path().join("secret.txt"), "s").unwrap();
    let err = tree.read("sub/../../secret.txt").unwrap_err();
    assert_eq!(err.message(), "Path traversal not allowed");
}
