// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use yare::parameterized;

#[parameterized(
    word = { "报告.docx", "docx", "word" },
    cell = { "概算.xlsx", "xlsx", "cell" },
    slide = { "汇报.pptx", "pptx", "slide" },
    pdf = { "图纸.pdf", "pdf", "pdf" },
    fallback = { "unknown.zzz", "zzz", "word" },
    uppercase = { "REPORT.DOCX", "docx", "word" },
)]
fn document_family_mapping(filename: &str, ext: &str, family: &str) {
    let (got_ext, got_family) = document_family(filename);
    assert_eq!(got_ext, ext);
    assert_eq!(got_family, family);
}

#[test]
fn jwt_has_three_segments_and_round_trips_payload() {
    let config = serde_json::json!({ "document": { "key": "k1" } });
    let jwt = sign_config(&config, "secret");
    let parts: Vec<&str> = jwt.split('.').collect();
    assert_eq!(parts.len(), 3);

    let header: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
    assert_eq!(header["alg"], "HS256");

    let payload: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
    assert_eq!(payload["document"]["key"], "k1");
}

#[test]
fn jwt_signature_depends_on_secret() {
    let config = serde_json::json!({ "a": 1 });
    let one = sign_config(&config, "secret-one");
    let two = sign_config(&config, "secret-two");
    assert_ne!(one, two);
    // same inputs are deterministic
    assert_eq!(one, sign_config(&config, "secret-one"));
}
