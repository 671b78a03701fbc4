// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound envelopes pushed to the browser over the session's WebSocket.

use crate::event::ChatEvent;
use serde::{Deserialize, Serialize};

/// One outbound WebSocket frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ChatEventBatch { payload: Vec<ChatEvent> },
    FileOpenRequest { payload: FileOpenPayload },
    DirectoryUpdate { payload: DirectoryPayload },
    StopRequestProcessed,
    Error { content: String },
}

impl OutboundMessage {
    /// Wrap a single chat event in a batch envelope.
    pub fn single_event(event: ChatEvent) -> Self {
        OutboundMessage::ChatEventBatch { payload: vec![event] }
    }

    /// Serialize to the text-frame payload. Serialization of these shapes
    /// cannot fail; a failure is reported as an error envelope string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","content":"serialize failed: {e}"}}"#)
        })
    }
}

/// Payload for `file_open_request`: a file the model just opened for the
/// user, carrying its short-lived download token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOpenPayload {
    pub filename: String,
    pub download_token: String,
    /// Lowercased extension, used by the client to pick a viewer.
    pub format: String,
}

/// Payload for `directory_update`: the working directory replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryPayload {
    pub directory: String,
    pub directory_token: String,
    pub files: Vec<DirectoryFilePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryFilePayload {
    pub filename: String,
    pub file_path: String,
    pub download_token: String,
    pub format: String,
}
