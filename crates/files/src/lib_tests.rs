// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn service() -> (tempfile::TempDir, FileService) {
    let dir = tempfile::tempdir().unwrap();
    let svc = FileService::new(dir.path().join("root")).unwrap();
    (dir, svc)
}

#[parameterized(
    absolute = { "/etc/passwd" },
    climb = { "../outside" },
    nested_climb = { "a/../../outside" },
    deep_climb = { "a/b/../../../x" },
)]
fn safe_path_rejects_escapes(input: &str) {
    let (_dir, svc) = service();
    let err = svc.safe_path(input).unwrap_err();
    assert!(matches!(err, FileServiceError::PathEscape { .. }));
}

#[parameterized(
    plain = { "a/b.txt", "a/b.txt" },
    dot = { "./a/b.txt", "a/b.txt" },
    balanced_parent = { "a/sub/../b.txt", "a/b.txt" },
)]
fn safe_path_normalizes(input: &str, expected: &str) {
    let (_dir, svc) = service();
    let resolved = svc.safe_path(input).unwrap();
    assert_eq!(resolved, svc.root().join(expected));
}

#[test]
fn path_escape_never_touches_filesystem() {
    let (_dir, svc) = service();
    // nothing under root except the staging dir, before and after
    let count = || std::fs::read_dir(svc.root()).unwrap().count();
    let before = count();
    assert!(svc.safe_path("../../etc/shadow").is_err());
    assert_eq!(count(), before);
}

#[tokio::test]
async fn save_bytes_is_atomic_and_readable() {
    let (_dir, svc) = service();
    let path = svc.save_bytes(b"hello world".to_vec(), "sub/f.txt").await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    assert_eq!(svc.read_bytes("sub/f.txt").await.unwrap(), b"hello world");
    // staging dir drained
    assert_eq!(std::fs::read_dir(svc.root().join(TEMP_DIR_NAME)).unwrap().count(), 0);
}

#[tokio::test]
async fn save_upload_streams_reader() {
    let (_dir, svc) = service();
    let data = vec![7u8; 64 * 1024];
    let path = svc.save_upload(std::io::Cursor::new(data.clone()), "big.bin").await.unwrap();
    assert_eq!(std::fs::read(path).unwrap(), data);
}

#[tokio::test]
async fn read_missing_file_is_not_found() {
    let (_dir, svc) = service();
    let err = svc.read_bytes("nope.txt").await.unwrap_err();
    assert!(matches!(err, FileServiceError::NotFound { .. }));
    let err = svc.read_stream("nope.txt").await.unwrap_err();
    assert!(matches!(err, FileServiceError::NotFound { .. }));
}

#[tokio::test]
async fn remove_directory_is_idempotent() {
    let (_dir, svc) = service();
    svc.save_bytes(b"x".to_vec(), "d/inner/f.txt").await.unwrap();
    svc.remove_directory("d").await.unwrap();
    assert!(!svc.directory_exists("d").await);
    // second removal still succeeds
    svc.remove_directory("d").await.unwrap();
}

#[tokio::test]
async fn placeholder_created_once() {
    let (_dir, svc) = service();
    let p1 = svc.create_placeholder("empty/dir", None).await.unwrap();
    assert!(p1.ends_with("placeholder.txt"));
    std::fs::write(&p1, b"kept").unwrap();
    let p2 = svc.create_placeholder("empty/dir", None).await.unwrap();
    assert_eq!(p1, p2);
    // existing file is not truncated
    assert_eq!(std::fs::read(&p2).unwrap(), b"kept");
}

#[tokio::test]
async fn existence_probes_do_not_error_on_bad_paths() {
    let (_dir, svc) = service();
    assert!(!svc.file_exists("../escape").await);
    assert!(!svc.directory_exists("/abs").await);
}

#[tokio::test]
async fn directory_upload_rolls_back_on_failure() {
    let (_dir, svc) = service();
    let files = vec![
        ("ok/one.txt".to_string(), b"1".to_vec()),
        ("ok/two.txt".to_string(), b"2".to_vec()),
        ("../escape.txt".to_string(), b"3".to_vec()),
    ];
    let err = svc.save_directory_upload(files, "proj").await.unwrap_err();
    assert!(matches!(err, FileServiceError::PathEscape { .. }));
    // earlier files were unlinked
    assert!(!svc.file_exists("proj/ok/one.txt").await);
    assert!(!svc.file_exists("proj/ok/two.txt").await);
}

#[tokio::test]
async fn directory_upload_happy_path() {
    let (_dir, svc) = service();
    let files = vec![
        ("a.txt".to_string(), b"a".to_vec()),
        ("nested/b.txt".to_string(), b"b".to_vec()),
    ];
    let base = svc.save_directory_upload(files, "proj").await.unwrap();
    assert!(base.ends_with("proj"));
    assert!(svc.file_exists("proj/a.txt").await);
    assert!(svc.file_exists("proj/nested/b.txt").await);
}

#[tokio::test]
async fn disk_usage_reports_consistent_numbers() {
    let (_dir, svc) = service();
    let usage = svc.disk_usage().await.unwrap();
    assert!(usage.total_bytes > 0);
    assert_eq!(usage.used_bytes, usage.total_bytes - usage.free_bytes);
    assert!(usage.total_human.ends_with(" GB"));
}
