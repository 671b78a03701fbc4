// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn cache_buster_lands_before_extension() {
    let out = cache_busted_url("http://files.local/docs/报告.pdf", "abcd1234");
    assert_eq!(out, "http://files.local/docs/报告_abcd1234.pdf");
}

#[parameterized(
    no_extension = { "http://h/x/archive", "http://h/x/archive_t0" },
    bare_name = { "file.txt", "file_t0.txt" },
    with_query = { "http://h/a.pdf?sig=1", "http://h/a_t0.pdf?sig=1" },
)]
fn cache_buster_edge_cases(input: &str, expected: &str) {
    assert_eq!(cache_busted_url(input, "t0"), expected);
}

#[test]
fn distinct_tokens_give_distinct_urls() {
    let a = cache_busted_url("http://h/f.pdf", "aaaaaaaa");
    let b = cache_busted_url("http://h/f.pdf", "bbbbbbbb");
    assert_ne!(a, b);
}
