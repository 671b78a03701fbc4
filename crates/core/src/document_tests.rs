// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    project = { DocType::Project, "project" },
    spec = { DocType::Spec, "spec" },
    management = { DocType::Management, "management" },
)]
fn doc_type_round_trips_through_str(doc_type: DocType, s: &str) {
    assert_eq!(doc_type.as_str(), s);
    assert_eq!(s.parse::<DocType>().unwrap(), doc_type);
}

#[test]
fn doc_type_rejects_unknown() {
    let err = "mystery".parse::<DocType>().unwrap_err();
    assert_eq!(err, ParseDocTypeError("mystery".to_string()));
}

#[test]
fn metadata_serde_is_tagged() {
    let meta = Metadata::Project {
        year: "2024".into(),
        project_name: "某输电工程".into(),
        status: "送审".into(),
        category: None,
        sub_category: Some("电气".into()),
    };
    let json = serde_json::to_value(&meta).unwrap();
    assert_eq!(json["kind"], "project");
    assert_eq!(json["year"], "2024");
    assert!(json.get("category").is_none());

    let back: Metadata = serde_json::from_value(json).unwrap();
    assert_eq!(back, meta);
}

#[test]
fn metadata_accessors_per_variant() {
    let spec = Metadata::Spec { category: "电气".into(), doc_name: Some("接地规范".into()) };
    assert_eq!(spec.category(), Some("电气"));
    assert_eq!(spec.doc_name(), Some("接地规范"));
    assert_eq!(spec.year(), None);

    assert_eq!(Metadata::Unknown.category(), None);
}

#[test]
fn roots_classify_and_rebuild() {
    let roots = DocumentRoots {
        projects: PathBuf::from("/data/projects"),
        specs: PathBuf::from("/data/specs"),
        management: PathBuf::from("/data/mgmt"),
    };
    let (doc_type, rel) = roots.classify(Path::new("/data/specs/电气/a.pdf")).unwrap();
    assert_eq!(doc_type, DocType::Spec);
    assert_eq!(rel, PathBuf::from("电气/a.pdf"));

    assert_eq!(
        roots.absolute(DocType::Spec, "电气/a.pdf"),
        PathBuf::from("/data/specs/电气/a.pdf")
    );

    assert!(roots.classify(Path::new("/elsewhere/x")).is_none());
}

#[test]
fn indexed_file_absolute_path() {
    let roots = DocumentRoots {
        projects: PathBuf::from("/p"),
        specs: PathBuf::from("/s"),
        management: PathBuf::from("/m"),
    };
    let row = IndexedFile {
        doc_type: DocType::Project,
        rel_path: "2024/X/送审/R.pdf".into(),
        file_name: "R.pdf".into(),
        ext: "pdf".into(),
        size: 10,
        modified_time: 0,
        content_hash: String::new(),
        last_scanned: 0,
        metadata: Metadata::Unknown,
    };
    assert_eq!(row.absolute_path(&roots), PathBuf::from("/p/2024/X/送审/R.pdf"));
}
