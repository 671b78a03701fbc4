// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn roles_serialize_lowercase() {
    assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
}

#[test]
fn plain_message_omits_tool_fields() {
    let msg = ChatMessage::user("hello");
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["role"], "user");
    assert_eq!(json["content"], "hello");
    assert!(json.get("tool_calls").is_none());
    assert!(json.get("tool_call_id").is_none());
}

#[test]
fn tool_call_uses_openai_shape() {
    let call = ToolCall::function_call("call_0", "query_project_files", "{\"year\":\"2024\"}");
    let json = serde_json::to_value(&call).unwrap();
    assert_eq!(json["type"], "function");
    assert_eq!(json["function"]["name"], "query_project_files");
    assert_eq!(json["function"]["arguments"], "{\"year\":\"2024\"}");
}

#[test]
fn assistant_with_tools_round_trips() {
    let msg = ChatMessage::assistant_with_tools(
        "",
        vec![ToolCall::function_call("call_1", "read_project_file", "{}")],
    );
    let json = serde_json::to_string(&msg).unwrap();
    let back: ChatMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
}

#[test]
fn tool_result_carries_call_id() {
    let msg = ChatMessage::tool("call_1", "{\"status\":\"success\"}");
    assert_eq!(msg.role, Role::Tool);
    assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
}

#[test]
fn deserializes_upstream_message_without_optionals() {
    let msg: ChatMessage =
        serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
    assert_eq!(msg.role, Role::Assistant);
    assert_eq!(msg.content, "hi");
    assert!(msg.tool_calls.is_none());
}
