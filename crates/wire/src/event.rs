// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat stream events, the unit inside a `chat_event_batch` envelope.

use serde::{Deserialize, Serialize};

/// One streaming event in the legacy envelope.
///
/// `event` is an open string because the SSE bridge forwards whatever the
/// upstream agent emits; the orchestrator itself only produces
/// `agent_message`, `agent_thought` and `message_end`. Unknown upstream
/// fields ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(flatten, default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatEvent {
    pub fn agent_message(
        answer: impl Into<String>,
        conversation_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            event: "agent_message".to_string(),
            answer: Some(answer.into()),
            observation: None,
            conversation_id: Some(conversation_id.into()),
            task_id: Some(task_id.into()),
            extra: serde_json::Map::new(),
        }
    }

    pub fn agent_thought(
        observation: impl Into<String>,
        conversation_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            event: "agent_thought".to_string(),
            answer: None,
            observation: Some(observation.into()),
            conversation_id: Some(conversation_id.into()),
            task_id: Some(task_id.into()),
            extra: serde_json::Map::new(),
        }
    }

    pub fn message_end(
        conversation_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            event: "message_end".to_string(),
            answer: None,
            observation: None,
            conversation_id: Some(conversation_id.into()),
            task_id: Some(task_id.into()),
            extra: serde_json::Map::new(),
        }
    }
}
