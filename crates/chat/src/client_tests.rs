// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_content_delta() {
    let delta = StreamDelta::parse(
        r#"{"choices":[{"delta":{"content":"你好"},"finish_reason":null}]}"#,
    )
    .unwrap()
    .unwrap();
    assert_eq!(delta.content.as_deref(), Some("你好"));
    assert!(delta.tool_calls.is_empty());
    assert!(delta.finish_reason.is_none());
}

#[test]
fn parse_done_sentinel() {
    assert!(StreamDelta::parse("[DONE]").unwrap().is_none());
    assert!(StreamDelta::parse(" [DONE] ").unwrap().is_none());
}

#[test]
fn parse_tool_call_delta() {
    let delta = StreamDelta::parse(
        r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"query_project_files","arguments":"{\"pro"}}]}}]}"#,
    )
    .unwrap()
    .unwrap();
    assert_eq!(delta.tool_calls.len(), 1);
    let call = &delta.tool_calls[0];
    assert_eq!(call.index, 0);
    assert_eq!(call.id.as_deref(), Some("call_abc"));
    assert_eq!(call.name.as_deref(), Some("query_project_files"));
    assert_eq!(call.arguments_fragment.as_deref(), Some("{\"pro"));
}

#[test]
fn parse_finish_reason() {
    let delta = StreamDelta::parse(
        r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
    )
    .unwrap()
    .unwrap();
    assert_eq!(delta.finish_reason.as_deref(), Some("tool_calls"));
}

#[test]
fn parse_garbage_is_error() {
    assert!(StreamDelta::parse("not json").is_err());
}

#[test]
fn buffer_assembles_split_arguments() {
    let mut buffer = ToolCallBuffer::new();
    buffer.apply(&ToolCallDelta {
        index: 0,
        id: Some("call_1".to_string()),
        name: Some("read_project_file".to_string()),
        arguments_fragment: Some("{\"relative_file".to_string()),
    });
    buffer.apply(&ToolCallDelta {
        index: 0,
        id: None,
        name: None,
        arguments_fragment: Some("_path\":\"a.pdf\"}".to_string()),
    });

    let calls = buffer.finish();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "call_1");
    assert_eq!(calls[0].function.name, "read_project_file");
    assert_eq!(calls[0].function.arguments, "{\"relative_file_path\":\"a.pdf\"}");
}

#[test]
fn buffer_synthesizes_missing_ids() {
    let mut buffer = ToolCallBuffer::new();
    buffer.apply(&ToolCallDelta {
        index: 0,
        id: None,
        name: Some("a".to_string()),
        arguments_fragment: None,
    });
    buffer.apply(&ToolCallDelta {
        index: 1,
        id: None,
        name: Some("b".to_string()),
        arguments_fragment: None,
    });

    let calls = buffer.finish();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].id, "call_0");
    assert_eq!(calls[1].id, "call_1");
    assert_ne!(calls[0].id, calls[1].id);
}

#[test]
fn buffer_handles_parallel_calls_by_index() {
    let mut buffer = ToolCallBuffer::new();
    buffer.apply(&ToolCallDelta {
        index: 0,
        id: Some("x".to_string()),
        name: Some("tool_a".to_string()),
        arguments_fragment: Some("{}".to_string()),
    });
    buffer.apply(&ToolCallDelta {
        index: 1,
        id: Some("y".to_string()),
        name: Some("tool_b".to_string()),
        arguments_fragment: Some("{\"k\":2}".to_string()),
    });

    let calls = buffer.finish();
    assert_eq!(calls[0].function.name, "tool_a");
    assert_eq!(calls[1].function.name, "tool_b");
    assert_eq!(calls[1].function.arguments, "{\"k\":2}");
}

#[test]
fn empty_buffer_reports_empty() {
    let buffer = ToolCallBuffer::new();
    assert!(buffer.is_empty());
    assert!(buffer.finish().is_empty());
}
