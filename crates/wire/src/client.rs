// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound client frames.

use serde::Deserialize;

/// A frame received from the browser client.
///
/// Control frames are tagged with `type`; a plain query frame has no tag and
/// is matched by its required `query` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Control(Control),
    Query(QueryMessage),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    StopChatStream,
    StartConversation { conversation_id: String },
}

/// A user query, optionally scoped to an existing conversation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryMessage {
    pub query: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Legacy upstream agent inputs, forwarded verbatim by the SSE bridge.
    #[serde(default)]
    pub inputs: Option<serde_json::Value>,
}

impl ClientMessage {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
