// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Index behavior against a real filesystem: scan, watch, delete.

use dd_core::DocType;
use dd_index::{md5_file, IndexService, Query};
use std::path::Path;
use std::time::Duration;

fn service(base: &Path) -> IndexService {
    let cfg = dd_core::test_support::test_config(base);
    IndexService::new(
        cfg.document_roots(),
        ":memory:",
        1,
        cfg.index.allowed_file_types.clone(),
    )
    .unwrap()
}

async fn rows_for(svc: &IndexService, doc_name: &str) -> Vec<dd_core::IndexedFile> {
    svc.find_documents(Query {
        doc_type: Some(DocType::Spec),
        doc_name: Some(doc_name.to_string()),
        ..Query::default()
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn created_spec_file_appears_with_its_hash() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    svc.start().await.unwrap();

    let file = dir.path().join("specs/电气/Z/Z.md");
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, "# 规范 Z").unwrap();
    let expected_hash = md5_file(&file).unwrap();

    let mut indexed = false;
    for _ in 0..100 {
        let rows = rows_for(&svc, "Z").await;
        if rows.len() == 1 && rows[0].content_hash == expected_hash {
            indexed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(indexed, "spec file should be indexed with its MD5 within the cooldown");

    // deletion removes the row
    std::fs::remove_file(&file).unwrap();
    let mut gone = false;
    for _ in 0..100 {
        if rows_for(&svc, "Z").await.is_empty() {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(gone, "deleted spec file should leave the index");

    svc.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn upsert_same_file_twice_is_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    let file = dir.path().join("projects/2024/A/送审/r.pdf");
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, b"v1").unwrap();

    assert!(svc.upsert_path(&file).await.unwrap());
    std::fs::write(&file, b"v2 longer").unwrap();
    assert!(svc.upsert_path(&file).await.unwrap());

    let rows = svc
        .find_documents(Query {
            project_name: Some("A".to_string()),
            ..Query::default()
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].size, 9);
    assert_eq!(rows[0].content_hash, md5_file(&file).unwrap());
}
