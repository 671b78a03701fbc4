// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::Query;
use crate::meta::md5_file;
use std::time::Duration;

fn roots_in(base: &Path) -> DocumentRoots {
    let roots = DocumentRoots {
        projects: base.join("projects"),
        specs: base.join("specs"),
        management: base.join("management"),
    };
    for dir in [&roots.projects, &roots.specs, &roots.management] {
        std::fs::create_dir_all(dir).unwrap();
    }
    roots
}

fn service_in(base: &Path, cooldown_secs: u64) -> IndexService {
    let allowed =
        ["pdf", "md", "docx", "txt", "jpg"].iter().map(|s| s.to_string()).collect();
    IndexService::new(roots_in(base), ":memory:", cooldown_secs, allowed).unwrap()
}

/// Poll until the query matches `expected` rows or the deadline passes.
async fn wait_for_rows(svc: &IndexService, query: Query, expected: usize) -> Vec<IndexedFile> {
    for _ in 0..100 {
        let rows = svc.find_documents(query.clone()).await.unwrap();
        if rows.len() == expected {
            return rows;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    svc.find_documents(query).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn full_scan_indexes_all_roots() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    std::fs::create_dir_all(base.join("projects/2024/A/送审")).unwrap();
    std::fs::write(base.join("projects/2024/A/送审/r.pdf"), b"r").unwrap();
    std::fs::create_dir_all(base.join("specs/电气/接地")).unwrap();
    std::fs::write(base.join("specs/电气/接地/n.md"), b"n").unwrap();
    // filtered: spec root only indexes allowed extensions
    std::fs::write(base.join("specs/电气/raw.bin"), b"b").unwrap();
    std::fs::create_dir_all(base.join("management/制度")).unwrap();
    std::fs::write(base.join("management/制度/z.docx"), b"z").unwrap();

    let svc = service_in(base, 1);
    let count = svc.full_scan().await.unwrap();
    assert_eq!(count, 3);

    let specs = svc
        .find_documents(Query { doc_type: Some(DocType::Spec), ..Query::default() })
        .await
        .unwrap();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].metadata.doc_name(), Some("接地"));
}

#[tokio::test(flavor = "multi_thread")]
async fn rescan_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    std::fs::create_dir_all(base.join("projects/2024/A/送审")).unwrap();
    std::fs::write(base.join("projects/2024/A/送审/r.pdf"), b"r").unwrap();

    let svc = service_in(base, 1);
    svc.full_scan().await.unwrap();
    svc.full_scan().await.unwrap();

    let rows = svc
        .find_documents(Query { project_name: Some("A".into()), ..Query::default() })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn watcher_picks_up_created_and_modified_files() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let svc = service_in(base, 1);
    svc.start().await.unwrap();

    let file = base.join("specs/电气/Z/doc.md");
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, b"first").unwrap();

    let rows = wait_for_rows(
        &svc,
        Query { doc_type: Some(DocType::Spec), rel_path: Some("电气/Z/doc.md".into()), ..Query::default() },
        1,
    )
    .await;
    assert_eq!(rows.len(), 1, "created file should be indexed after the cooldown");
    assert_eq!(rows[0].content_hash, md5_file(&file).unwrap());

    // modify and wait for the re-upsert to land
    std::fs::write(&file, b"second version").unwrap();
    let expected = md5_file(&file).unwrap();
    let mut hash = String::new();
    for _ in 0..100 {
        let rows = svc
            .find_documents(Query {
                rel_path: Some("电气/Z/doc.md".into()),
                ..Query::default()
            })
            .await
            .unwrap();
        if let Some(row) = rows.first() {
            hash = row.content_hash.clone();
            if hash == expected {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(hash, expected);

    svc.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn watcher_deletes_rows_for_removed_directory() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    std::fs::create_dir_all(base.join("projects/2024/A/送审")).unwrap();
    std::fs::write(base.join("projects/2024/A/送审/one.pdf"), b"1").unwrap();
    std::fs::write(base.join("projects/2024/A/送审/two.pdf"), b"2").unwrap();

    let svc = service_in(base, 1);
    svc.start().await.unwrap();
    assert_eq!(
        svc.find_documents(Query { project_name: Some("A".into()), ..Query::default() })
            .await
            .unwrap()
            .len(),
        2
    );

    std::fs::remove_dir_all(base.join("projects/2024/A")).unwrap();
    let rows = wait_for_rows(
        &svc,
        Query { project_name: Some("A".into()), ..Query::default() },
        0,
    )
    .await;
    assert!(rows.is_empty(), "rows under a removed directory must disappear");

    svc.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn upsert_path_bypasses_debounce() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let svc = service_in(base, 3600);

    let file = base.join("management/制度/new.docx");
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, b"x").unwrap();

    assert!(svc.upsert_path(&file).await.unwrap());
    let rows = svc
        .find_documents(Query { rel_path: Some("制度/new.docx".into()), ..Query::default() })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    // paths outside every root are rejected quietly
    assert!(!svc.upsert_path(Path::new("/tmp/outside.txt")).await.unwrap());
}
