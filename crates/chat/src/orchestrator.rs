// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection chat orchestration.
//!
//! One orchestrator owns one WebSocket's conversation: it reacts to client
//! frames, runs at most one completion task at a time, executes tool calls,
//! and recurses with the tool results until the model stops or the depth
//! bound trips. It never raises toward the socket — failures become
//! `{type:"error"}` envelopes.

use crate::client::{ChatError, LlmClient, StreamDelta, ToolCallBuffer};
use crate::history::persist_history;
use dd_core::{ChatMessage, Config};
use dd_session::{SessionSink, SinkMessage};
use dd_tools::ToolHost;
use dd_wire::{ChatEvent, Control, OutboundMessage, QueryMessage};
use futures_util::StreamExt;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything a completion task needs, shared with the orchestrator handle.
struct Shared {
    client: Arc<LlmClient>,
    tools: Arc<ToolHost>,
    config: Arc<Config>,
    sink: SessionSink,
    username: String,
    history: Mutex<Vec<ChatMessage>>,
    conversation_id: Mutex<String>,
    stop_requested: AtomicBool,
    tool_schemas: Vec<Value>,
}

impl Shared {
    fn send(&self, message: OutboundMessage) {
        let _ = self.sink.send(SinkMessage::Event(message));
    }

    fn system_message(&self) -> ChatMessage {
        ChatMessage::system(format!(
            "{}\n以下是用户 `{}` 的发言：",
            self.config.llm.system_prompt, self.username
        ))
    }
}

/// In-flight completion bookkeeping.
struct Inflight {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

pub struct ChatOrchestrator {
    shared: Arc<Shared>,
    inflight: Mutex<Option<Inflight>>,
}

impl ChatOrchestrator {
    /// Build for one connection; the tool schema list is fetched once and
    /// cached for every completion.
    pub fn new(
        client: Arc<LlmClient>,
        tools: Arc<ToolHost>,
        config: Arc<Config>,
        sink: SessionSink,
        username: impl Into<String>,
    ) -> Self {
        let username = username.into();
        let tool_schemas = tools.schemas();
        let shared = Arc::new(Shared {
            client,
            tools,
            config,
            sink,
            username: username.clone(),
            history: Mutex::new(Vec::new()),
            conversation_id: Mutex::new(dd_core::new_session_id()),
            stop_requested: AtomicBool::new(false),
            tool_schemas,
        });
        info!(user = %username, "chat orchestrator ready");
        Self { shared, inflight: Mutex::new(None) }
    }

    /// React to one inbound control frame.
    pub async fn handle_control(&self, control: Control) {
        match control {
            Control::StopChatStream => {
                debug!(user = %self.shared.username, "stop requested");
                self.shared.stop_requested.store(true, Ordering::SeqCst);
                self.cancel_inflight().await;
                self.shared.send(OutboundMessage::StopRequestProcessed);
            }
            Control::StartConversation { conversation_id } => {
                self.cancel_inflight().await;
                let mut history = self.shared.history.lock().await;
                history.clear();
                history.push(self.shared.system_message());
                drop(history);
                *self.shared.conversation_id.lock().await = conversation_id.clone();
                info!(user = %self.shared.username, conversation = %conversation_id, "conversation reset");
            }
        }
    }

    /// React to a user query: cancel whatever is running, clear the stop
    /// flag, append the user turn, launch a fresh completion task.
    pub async fn handle_query(&self, query: QueryMessage) {
        self.cancel_inflight().await;
        self.shared.stop_requested.store(false, Ordering::SeqCst);

        if let Some(conversation_id) = &query.conversation_id {
            *self.shared.conversation_id.lock().await = conversation_id.clone();
        }
        {
            let mut history = self.shared.history.lock().await;
            if history.is_empty() {
                let system = self.shared.system_message();
                history.push(system);
            }
            history.push(ChatMessage::user(query.query.clone()));
        }

        let shared = Arc::clone(&self.shared);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let conversation_id = shared.conversation_id.lock().await.clone();
            let task_id = dd_core::new_session_id();
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    debug!(user = %shared.username, "completion cancelled");
                }
                _ = run_completion(Arc::clone(&shared), conversation_id.clone(), task_id.clone(), 0) => {}
            }
            // the envelope contract: every turn ends with message_end,
            // cancelled or not
            shared.send(OutboundMessage::single_event(ChatEvent::message_end(
                conversation_id,
                task_id,
            )));
        });
        *self.inflight.lock().await = Some(Inflight { cancel, task });
    }

    /// Abort the running completion task, if any.
    pub async fn cancel_inflight(&self) {
        if let Some(inflight) = self.inflight.lock().await.take() {
            inflight.cancel.cancel();
            let _ = inflight.task.await;
        }
    }

    /// Let the in-flight completion run to completion (disconnect path).
    pub async fn wait_inflight(&self) {
        if let Some(inflight) = self.inflight.lock().await.take() {
            let _ = inflight.task.await;
        }
    }

    /// Dump the history on disconnect, keyed by the login session.
    pub async fn persist(&self, session_id: &str) {
        let history = self.shared.history.lock().await;
        persist_history(
            &self.shared.config.roots.conversation_root,
            &self.shared.username,
            session_id,
            &history,
        )
        .await;
    }

    #[cfg(test)]
    pub(crate) async fn history_snapshot(&self) -> Vec<ChatMessage> {
        self.shared.history.lock().await.clone()
    }
}

/// One completion pass: stream, forward deltas, execute tool calls, recurse.
fn run_completion(
    shared: Arc<Shared>,
    conversation_id: String,
    task_id: String,
    depth: u32,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        if depth > shared.config.llm.max_tool_depth {
            warn!(user = %shared.username, depth, "tool recursion depth exceeded");
            shared.send(OutboundMessage::Error {
                content: format!(
                    "工具调用递归超过最大深度 {}，请简化问题后重试。",
                    shared.config.llm.max_tool_depth
                ),
            });
            return;
        }

        let messages = shared.history.lock().await.clone();
        let mut stream = match shared.client.stream_chat(&messages, &shared.tool_schemas).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(user = %shared.username, error = %e, "upstream chat failed");
                shared.send(OutboundMessage::Error { content: format!("上游模型调用失败: {e}") });
                return;
            }
        };

        let mut full_content = String::new();
        let mut tool_buffer = ToolCallBuffer::new();
        let mut finish_reason: Option<String> = None;

        while let Some(delta) = stream.next().await {
            if shared.stop_requested.load(Ordering::SeqCst) {
                debug!(user = %shared.username, "stop flag observed mid-stream");
                return;
            }
            let delta: StreamDelta = match delta {
                Ok(delta) => delta,
                Err(ChatError::Http(e)) => {
                    warn!(user = %shared.username, error = %e, "stream read failed");
                    shared.send(OutboundMessage::Error { content: format!("上游流读取失败: {e}") });
                    return;
                }
                Err(e) => {
                    warn!(user = %shared.username, error = %e, "stream chunk error");
                    continue;
                }
            };
            if let Some(text) = &delta.content {
                if !text.is_empty() {
                    full_content.push_str(text);
                    shared.send(OutboundMessage::single_event(ChatEvent::agent_message(
                        text.clone(),
                        conversation_id.clone(),
                        task_id.clone(),
                    )));
                }
            }
            for call_delta in &delta.tool_calls {
                tool_buffer.apply(call_delta);
            }
            if let Some(reason) = delta.finish_reason {
                finish_reason = Some(reason);
            }
        }

        match finish_reason.as_deref() {
            Some("tool_calls") if !tool_buffer.is_empty() => {
                let calls = tool_buffer.finish();
                {
                    let mut history = shared.history.lock().await;
                    history.push(ChatMessage::assistant_with_tools(
                        full_content.clone(),
                        calls.clone(),
                    ));
                }

                let mut observations: Vec<String> = Vec::with_capacity(calls.len());
                for call in &calls {
                    info!(user = %shared.username, tool = %call.function.name, "executing tool call");
                    let output = shared
                        .tools
                        .invoke(&call.function.name, &shared.username, &call.function.arguments)
                        .await;
                    observations.push(format!("{}: {}", call.function.name, output));
                    shared.history.lock().await.push(ChatMessage::tool(call.id.clone(), output));
                }
                shared.send(OutboundMessage::single_event(ChatEvent::agent_thought(
                    observations.join("\n"),
                    conversation_id.clone(),
                    task_id.clone(),
                )));

                run_completion(shared, conversation_id, task_id, depth + 1).await;
            }
            _ => {
                shared.history.lock().await.push(ChatMessage::assistant(full_content));
            }
        }
    })
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
