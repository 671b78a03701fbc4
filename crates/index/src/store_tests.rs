// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn row(doc_type: DocType, rel_path: &str, metadata: Metadata) -> IndexedFile {
    IndexedFile {
        doc_type,
        rel_path: rel_path.to_string(),
        file_name: rel_path.rsplit('/').next().unwrap_or(rel_path).to_string(),
        ext: rel_path.rsplit('.').next().unwrap_or_default().to_lowercase(),
        size: 1,
        modified_time: 100,
        content_hash: "aa".to_string(),
        last_scanned: 100,
        metadata,
    }
}

fn project_row(rel_path: &str, year: &str, name: &str) -> IndexedFile {
    row(
        DocType::Project,
        rel_path,
        Metadata::Project {
            year: year.to_string(),
            project_name: name.to_string(),
            status: "送审".to_string(),
            category: None,
            sub_category: None,
        },
    )
}

#[test]
fn upsert_twice_keeps_single_row() {
    let store = IndexStore::open(":memory:").unwrap();
    let mut r = project_row("2024/A/送审/x.pdf", "2024", "A");
    store.upsert(&r).unwrap();
    r.content_hash = "bb".to_string();
    r.size = 2;
    store.upsert(&r).unwrap();

    assert_eq!(store.len().unwrap(), 1);
    let found = store
        .find(&Query { rel_path: Some("2024/A/送审/x.pdf".into()), ..Query::default() })
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].content_hash, "bb");
    assert_eq!(found[0].size, 2);
}

#[test]
fn same_rel_path_in_two_roots_is_two_rows() {
    let store = IndexStore::open(":memory:").unwrap();
    store.upsert(&row(DocType::Project, "a/x.pdf", Metadata::Unknown)).unwrap();
    store
        .upsert(&row(DocType::Spec, "a/x.pdf", Metadata::Spec { category: "a".into(), doc_name: None }))
        .unwrap();
    assert_eq!(store.len().unwrap(), 2);
}

#[test]
fn delete_prefix_removes_subtree_only() {
    let store = IndexStore::open(":memory:").unwrap();
    store.upsert(&project_row("2024/A/送审/x.pdf", "2024", "A")).unwrap();
    store.upsert(&project_row("2024/A/送审/sub/y.pdf", "2024", "A")).unwrap();
    store.upsert(&project_row("2024/AB/送审/z.pdf", "2024", "AB")).unwrap();

    // "2024/A" must not match the sibling "2024/AB"
    let n = store.delete_prefix(DocType::Project, "2024/A").unwrap();
    assert_eq!(n, 2);
    let left = store
        .find(&Query { doc_type: Some(DocType::Project), year: Some("2024".into()), ..Query::default() })
        .unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].rel_path, "2024/AB/送审/z.pdf");
}

#[test]
fn delete_exact_row() {
    let store = IndexStore::open(":memory:").unwrap();
    store.upsert(&project_row("2024/A/送审/x.pdf", "2024", "A")).unwrap();
    assert_eq!(store.delete(DocType::Project, "2024/A/送审/x.pdf").unwrap(), 1);
    assert_eq!(store.delete(DocType::Project, "2024/A/送审/x.pdf").unwrap(), 0);
}

#[test]
fn find_picks_like_for_wildcards() {
    let store = IndexStore::open(":memory:").unwrap();
    store.upsert(&project_row("2024/城东线路/送审/r.pdf", "2024", "城东线路")).unwrap();
    store.upsert(&project_row("2024/城西线路/送审/r.pdf", "2024", "城西线路")).unwrap();

    let exact = store
        .find(&Query { project_name: Some("城东线路".into()), ..Query::default() })
        .unwrap();
    assert_eq!(exact.len(), 1);

    let like = store
        .find(&Query { project_name: Some("%线路%".into()), ..Query::default() })
        .unwrap();
    assert_eq!(like.len(), 2);

    // literal percent-free strings never behave as patterns
    let none = store
        .find(&Query { project_name: Some("线路".into()), ..Query::default() })
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn empty_query_returns_nothing() {
    let store = IndexStore::open(":memory:").unwrap();
    store.upsert(&project_row("2024/A/送审/x.pdf", "2024", "A")).unwrap();
    assert!(store.find(&Query::default()).unwrap().is_empty());
}

#[test]
fn metadata_round_trips_through_store() {
    let store = IndexStore::open(":memory:").unwrap();
    let meta = Metadata::Spec { category: "电气".into(), doc_name: Some("接地规范".into()) };
    store.upsert(&row(DocType::Spec, "电气/接地规范/a.pdf", meta.clone())).unwrap();

    let found = store
        .find(&Query { doc_type: Some(DocType::Spec), doc_name: Some("接地规范".into()), ..Query::default() })
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].metadata, meta);
}

#[test]
fn distinct_project_names_with_year_filter() {
    let store = IndexStore::open(":memory:").unwrap();
    store.upsert(&project_row("2024/A/送审/1.pdf", "2024", "A")).unwrap();
    store.upsert(&project_row("2024/A/送审/2.pdf", "2024", "A")).unwrap();
    store.upsert(&project_row("2023/B/送审/3.pdf", "2023", "B")).unwrap();

    assert_eq!(store.distinct_project_names(None).unwrap(), vec!["A", "B"]);
    assert_eq!(store.distinct_project_names(Some("2024")).unwrap(), vec!["A"]);
}

#[test]
fn specs_by_category_maps_doc_names() {
    let store = IndexStore::open(":memory:").unwrap();
    store
        .upsert(&row(
            DocType::Spec,
            "电气/接地规范/a.pdf",
            Metadata::Spec { category: "电气".into(), doc_name: Some("接地规范".into()) },
        ))
        .unwrap();
    store
        .upsert(&row(
            DocType::Spec,
            "电气/图例/b.jpg",
            Metadata::Spec { category: "电气".into(), doc_name: None },
        ))
        .unwrap();

    let map = store.specs_by_category("电气").unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("接地规范").map(String::as_str), Some("电气/接地规范/a.pdf"));
}

#[test]
fn persists_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idx/index.db");
    let path_str = path.to_str().unwrap();
    {
        let store = IndexStore::open(path_str).unwrap();
        store.upsert(&project_row("2024/A/送审/x.pdf", "2024", "A")).unwrap();
    }
    let store = IndexStore::open(path_str).unwrap();
    assert_eq!(store.len().unwrap(), 1);
}
