// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn identical_inputs_yield_none() {
    assert!(unified_diff("a\nb\nc\n", "a\nb\nc\n").is_none());
    assert!(unified_diff("", "").is_none());
}

#[test]
fn single_line_change_shows_both_sides() {
    let old = "第一章 总则\n电压等级为110kV\n第二章 设备\n";
    let new = "第一章 总则\n电压等级为220kV\n第二章 设备\n";
    let diff = unified_diff(old, new).unwrap();
    assert!(diff.contains("-电压等级为110kV"));
    assert!(diff.contains("+电压等级为220kV"));
    assert!(diff.contains("@@"));
    // the file header is stripped
    assert!(!diff.contains("---"));
    assert!(!diff.contains("+++"));
}

#[test]
fn context_lines_are_prefixed_with_space() {
    let diff = unified_diff("a\nb\nc\n", "a\nX\nc\n").unwrap();
    assert!(diff.lines().any(|l| l == " a"));
    assert!(diff.lines().any(|l| l == " c"));
}

#[test]
fn addition_only() {
    let diff = unified_diff("a\n", "a\nb\n").unwrap();
    assert!(diff.contains("+b"));
    assert!(!diff.contains("-a"));
}
