// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The envelope contract the browser client depends on.

use dd_wire::{ChatEvent, ClientMessage, Control, OutboundMessage};

#[test]
fn client_frames_cover_the_three_inbound_shapes() {
    assert!(matches!(
        ClientMessage::parse(r#"{"type":"stop_chat_stream"}"#).unwrap(),
        ClientMessage::Control(Control::StopChatStream)
    ));
    assert!(matches!(
        ClientMessage::parse(r#"{"type":"start_conversation","conversation_id":"c"}"#).unwrap(),
        ClientMessage::Control(Control::StartConversation { .. })
    ));
    assert!(matches!(
        ClientMessage::parse(r#"{"query":"你好","conversation_id":"c"}"#).unwrap(),
        ClientMessage::Query(_)
    ));
}

#[test]
fn outbound_event_batch_matches_legacy_shape() {
    let frame = OutboundMessage::ChatEventBatch {
        payload: vec![
            ChatEvent::agent_message("部分回答", "conv", "task"),
            ChatEvent::agent_thought("工具输出", "conv", "task"),
            ChatEvent::message_end("conv", "task"),
        ],
    }
    .to_json();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

    assert_eq!(value["type"], "chat_event_batch");
    let events = value["payload"].as_array().unwrap();
    assert_eq!(events[0]["event"], "agent_message");
    assert_eq!(events[0]["answer"], "部分回答");
    assert_eq!(events[1]["event"], "agent_thought");
    assert_eq!(events[1]["observation"], "工具输出");
    assert_eq!(events[2]["event"], "message_end");
    for event in events {
        assert_eq!(event["conversation_id"], "conv");
        assert_eq!(event["task_id"], "task");
    }
}

#[test]
fn upstream_events_pass_through_unknown_fields() {
    // what a Dify-style upstream emits survives re-enveloping untouched
    let upstream = r#"{"event":"agent_log","data":{"step":1},"conversation_id":"c"}"#;
    let event: ChatEvent = serde_json::from_str(upstream).unwrap();
    let reencoded = serde_json::to_value(&event).unwrap();
    assert_eq!(reencoded["event"], "agent_log");
    assert_eq!(reencoded["data"]["step"], 1);
}
