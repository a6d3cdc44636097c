use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::Path;

use assert_cmd::Command;
use filetime::FileTime;
use predicates::prelude::*;
use tempfile::TempDir;

fn treecp_cmd() -> Command {
    let mut cmd = Command::cargo_bin("treecp").expect("Failed to find treecp binary for testing");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn setup() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    fs::create_dir_all(&src).expect("mkdir src");
    fs::create_dir_all(&dst).expect("mkdir dst");
    (tmp, src, dst)
}

fn skip_as_root(name_test: &str) -> bool {
    let if_root = unsafe { libc::geteuid() == 0 };
    if if_root {
        eprintln!("skipped {name_test}: running as root bypasses permission checks");
    }
    if_root
}

#[test]
fn test_version_flag() {
    treecp_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_single_argument_prints_usage_and_fails() {
    let (_tmp, src, dst) = setup();
    fs::write(src.join("f.txt"), "hello").expect("write");

    treecp_cmd()
        .arg(src.join("f.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
    assert_eq!(fs::read_dir(&dst).expect("read dst").count(), 0);
}

#[test]
fn test_copy_regular_file_keeps_content_and_mode() {
    let (_tmp, src, dst) = setup();
    let path_file = src.join("f.txt");
    fs::write(&path_file, "hello").expect("write");
    fs::set_permissions(&path_file, fs::Permissions::from_mode(0o644)).expect("chmod");

    treecp_cmd().arg(&path_file).arg(&dst).assert().success();

    let path_copy = dst.join("f.txt");
    assert_eq!(fs::read_to_string(&path_copy).expect("read"), "hello");
    let n_mode = fs::metadata(&path_copy).expect("stat").permissions().mode() & 0o7777;
    assert_eq!(n_mode, 0o644);
}

#[test]
fn test_copy_mixed_sources_in_one_run() {
    let (_tmp, src, dst) = setup();
    fs::write(src.join("a.txt"), "a").expect("write");
    fs::create_dir_all(src.join("tree/sub")).expect("mkdir");
    fs::write(src.join("tree/sub/b.txt"), "b").expect("write");
    symlink("/etc/hosts", src.join("link")).expect("symlink");

    treecp_cmd()
        .arg(src.join("a.txt"))
        .arg(src.join("tree"))
        .arg(src.join("link"))
        .arg(&dst)
        .assert()
        .success();

    assert!(dst.join("a.txt").is_file());
    assert!(dst.join("tree/sub").is_dir());
    assert_eq!(
        fs::read_to_string(dst.join("tree/sub/b.txt")).expect("read"),
        "b"
    );
    assert_eq!(
        fs::read_link(dst.join("link")).expect("readlink"),
        Path::new("/etc/hosts")
    );
}

#[test]
fn test_rerun_warns_on_existing_directory() {
    let (_tmp, src, dst) = setup();
    fs::write(src.join("a.txt"), "a").expect("write");

    treecp_cmd().arg(&src).arg(&dst).assert().success();
    treecp_cmd()
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stderr(predicate::str::contains("ignored copy of"));
}

#[test]
fn test_quiet_hides_warnings() {
    let (_tmp, src, dst) = setup();
    fs::write(src.join("a.txt"), "a").expect("write");

    treecp_cmd().arg(&src).arg(&dst).assert().success();
    treecp_cmd()
        .arg("--quiet")
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_fifo_is_skipped_with_warning() {
    let (_tmp, src, dst) = setup();
    let path_fifo = src.join("pipe");
    let c_path = CString::new(path_fifo.as_os_str().as_bytes()).expect("c path");
    assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) }, 0);
    fs::write(src.join("after.txt"), "after").expect("write");

    treecp_cmd()
        .arg(&path_fifo)
        .arg(src.join("after.txt"))
        .arg(&dst)
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrong file type"));
    assert!(!dst.join("pipe").exists());
    assert!(dst.join("after.txt").is_file());
}

#[test]
fn test_missing_source_fails_with_path_in_message() {
    let (_tmp, src, dst) = setup();

    treecp_cmd()
        .arg(src.join("missing"))
        .arg(&dst)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("lstat() error on"))
        .stderr(predicate::str::contains("missing"));
}

#[test]
fn test_missing_destination_fails() {
    let (_tmp, src, dst) = setup();
    fs::write(src.join("a.txt"), "a").expect("write");

    treecp_cmd()
        .arg(src.join("a.txt"))
        .arg(dst.join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("access() error on destination folder"));
}

#[test]
fn test_read_only_destination_fails_before_copying() {
    if skip_as_root("test_read_only_destination_fails_before_copying") {
        return;
    }
    let (_tmp, src, dst) = setup();
    fs::write(src.join("a.txt"), "a").expect("write");
    fs::set_permissions(&dst, fs::Permissions::from_mode(0o555)).expect("chmod");

    let res_assert = treecp_cmd().arg(src.join("a.txt")).arg(&dst).assert();
    fs::set_permissions(&dst, fs::Permissions::from_mode(0o755)).expect("restore");
    res_assert.failure();
    assert!(!dst.join("a.txt").exists());
}

#[test]
fn test_symlink_failure_inside_tree_aborts_run() {
    let (tmp, src, dst) = setup();
    symlink("a.txt", src.join("link")).expect("symlink");
    let path_later = tmp.path().join("later.txt");
    fs::write(&path_later, "later").expect("write");
    fs::write(dst.join("src"), "not a directory").expect("write blocker");

    treecp_cmd()
        .arg(&src)
        .arg(&path_later)
        .arg(&dst)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("symlink() error on"))
        .stderr(predicate::str::contains("symlink(): ignored copy").not());
    assert!(!dst.join("later.txt").exists());
}

#[test]
fn test_dry_run_creates_nothing() {
    let (_tmp, src, dst) = setup();
    fs::write(src.join("a.txt"), "a").expect("write");

    treecp_cmd()
        .arg("--dry-run")
        .arg("-v")
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stderr(predicate::str::contains("[dry-run]"));
    assert_eq!(fs::read_dir(&dst).expect("read dst").count(), 0);
}

#[test]
fn test_restore_dir_times_keeps_directory_mtime() {
    let (_tmp, src, dst) = setup();
    fs::write(src.join("a.txt"), "a").expect("write");
    let time_modify = FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_times(&src, time_modify, time_modify).expect("set times");

    treecp_cmd()
        .arg("--restore-dir-times")
        .arg(&src)
        .arg(&dst)
        .assert()
        .success();

    let meta = fs::metadata(dst.join("src")).expect("stat");
    assert_eq!(FileTime::from_last_modification_time(&meta), time_modify);
}

#[test]
fn test_zero_chunk_size_is_rejected() {
    let (_tmp, src, dst) = setup();
    fs::write(src.join("a.txt"), "a").expect("write");

    treecp_cmd()
        .args(["--chunk-size", "0"])
        .arg(src.join("a.txt"))
        .arg(&dst)
        .assert()
        .failure()
        .stderr(predicate::str::contains("n_bytes_chunk"));
}
