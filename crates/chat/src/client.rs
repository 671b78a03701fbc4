// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming client for an OpenAI-compatible chat-completions endpoint.

use crate::sse::{SseParser, DONE_SENTINEL};
use dd_core::config::LlmConfig;
use dd_core::{ChatMessage, ToolCall};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream chunk malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One parsed streaming chunk, reduced to what the orchestrator consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDelta {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
    pub finish_reason: Option<String>,
}

/// A fragment of an assembling tool call, keyed by stream index.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments_fragment: Option<String>,
}

impl StreamDelta {
    /// Parse one SSE data payload. Returns `None` for the `[DONE]` sentinel.
    pub fn parse(payload: &str) -> Result<Option<Self>, ChatError> {
        if payload.trim() == DONE_SENTINEL {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(payload)?;
        let choice = value.pointer("/choices/0").cloned().unwrap_or(Value::Null);
        let delta = choice.get("delta").cloned().unwrap_or(Value::Null);

        let tool_calls = delta
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| ToolCallDelta {
                        index: call.get("index").and_then(Value::as_u64).unwrap_or(0) as usize,
                        id: call.get("id").and_then(Value::as_str).map(str::to_string),
                        name: call
                            .pointer("/function/name")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        arguments_fragment: call
                            .pointer("/function/arguments")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(Self {
            content: delta.get("content").and_then(Value::as_str).map(str::to_string),
            tool_calls,
            finish_reason: choice
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        }))
    }
}

/// Accumulates tool-call deltas by index into complete calls.
///
/// Ids are occasionally absent from the first fragment of a call; a
/// monotonic fallback id keeps the tool-result pairing intact.
#[derive(Debug, Default)]
pub struct ToolCallBuffer {
    calls: Vec<(String, String, String)>, // (id, name, arguments)
    synthesized: usize,
}

impl ToolCallBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, delta: &ToolCallDelta) {
        while self.calls.len() <= delta.index {
            self.synthesized += 1;
            self.calls.push((format!("call_{}", self.synthesized - 1), String::new(), String::new()));
        }
        let slot = &mut self.calls[delta.index];
        if let Some(id) = &delta.id {
            if !id.is_empty() {
                slot.0 = id.clone();
            }
        }
        if let Some(name) = &delta.name {
            slot.1.push_str(name);
        }
        if let Some(fragment) = &delta.arguments_fragment {
            slot.2.push_str(fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .map(|(id, name, arguments)| ToolCall::function_call(id, name, arguments))
            .collect()
    }
}

/// The upstream chat endpoint.
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(http: reqwest::Client, config: LlmConfig) -> Self {
        Self { http, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Open a streaming completion; yields parsed deltas until the upstream
    /// closes or sends `[DONE]`.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<impl Stream<Item = Result<StreamDelta, ChatError>> + Unpin, ChatError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }
        debug!(model = %self.config.model, messages = messages.len(), "opening chat stream");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let mut parser = SseParser::new();
        let mut done = false;
        let byte_stream = response.bytes_stream();
        let stream = byte_stream
            .map(move |chunk| -> Vec<Result<StreamDelta, ChatError>> {
                if done {
                    return Vec::new();
                }
                let chunk = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => return vec![Err(ChatError::Http(e))],
                };
                let text = String::from_utf8_lossy(&chunk);
                parser
                    .push(&text)
                    .into_iter()
                    .filter_map(|payload| match StreamDelta::parse(&payload) {
                        Ok(Some(delta)) => Some(Ok(delta)),
                        Ok(None) => {
                            done = true;
                            None
                        }
                        Err(e) => {
                            warn!(error = %e, "dropping malformed stream chunk");
                            None
                        }
                    })
                    .collect()
            })
            .flat_map(futures_util::stream::iter);
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
