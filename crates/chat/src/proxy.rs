// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Legacy WS→SSE bridge.
//!
//! Forwards the user's query to a thin "Dify-style" upstream agent, reads
//! its SSE stream and re-envelopes every parsed event as a
//! `chat_event_batch` frame. Stop and disconnect semantics mirror the
//! orchestrator.

use crate::sse::SseParser;
use dd_core::config::UpstreamConfig;
use dd_session::{SessionSink, SinkMessage};
use dd_wire::{ChatEvent, Control, OutboundMessage, QueryMessage};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct ProxyShared {
    http: reqwest::Client,
    config: UpstreamConfig,
    sink: SessionSink,
    username: String,
    stop_requested: AtomicBool,
}

impl ProxyShared {
    fn send(&self, message: OutboundMessage) {
        let _ = self.sink.send(SinkMessage::Event(message));
    }
}

struct Inflight {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

pub struct StreamProxy {
    shared: Arc<ProxyShared>,
    inflight: Mutex<Option<Inflight>>,
}

impl StreamProxy {
    pub fn new(
        http: reqwest::Client,
        config: UpstreamConfig,
        sink: SessionSink,
        username: impl Into<String>,
    ) -> Self {
        Self {
            shared: Arc::new(ProxyShared {
                http,
                config,
                sink,
                username: username.into(),
                stop_requested: AtomicBool::new(false),
            }),
            inflight: Mutex::new(None),
        }
    }

    pub async fn handle_control(&self, control: Control) {
        match control {
            Control::StopChatStream => {
                self.shared.stop_requested.store(true, Ordering::SeqCst);
                self.cancel_inflight().await;
                self.shared.send(OutboundMessage::StopRequestProcessed);
            }
            Control::StartConversation { conversation_id } => {
                // the upstream agent owns its own history; nothing to reset
                debug!(user = %self.shared.username, conversation = %conversation_id, "proxy conversation switch");
            }
        }
    }

    pub async fn handle_query(&self, query: QueryMessage) {
        self.cancel_inflight().await;
        self.shared.stop_requested.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {}
                _ = forward_stream(Arc::clone(&shared), query) => {}
            }
        });
        *self.inflight.lock().await = Some(Inflight { cancel, task });
    }

    pub async fn cancel_inflight(&self) {
        if let Some(inflight) = self.inflight.lock().await.take() {
            inflight.cancel.cancel();
            let _ = inflight.task.await;
        }
    }
}

async fn forward_stream(shared: Arc<ProxyShared>, query: QueryMessage) {
    let mut body = serde_json::json!({
        "query": query.query,
        "inputs": query.inputs.unwrap_or_else(|| serde_json::json!({})),
        "user": shared.username,
        "response_mode": "streaming",
    });
    if let Some(conversation_id) = &query.conversation_id {
        body["conversation_id"] = serde_json::Value::String(conversation_id.clone());
    }

    let response = shared
        .http
        .post(&shared.config.chat_url)
        .timeout(Duration::from_secs(shared.config.http_timeout_secs.max(1)))
        .bearer_auth(&shared.config.api_key)
        .json(&body)
        .send()
        .await
        .and_then(|r| r.error_for_status());
    let response = match response {
        Ok(response) => response,
        Err(e) => {
            warn!(user = %shared.username, error = %e, "upstream agent request failed");
            shared.send(OutboundMessage::Error { content: format!("上游代理调用失败: {e}") });
            return;
        }
    };

    info!(user = %shared.username, "proxy stream opened");
    let mut parser = SseParser::new();
    let mut byte_stream = response.bytes_stream();
    while let Some(chunk) = byte_stream.next().await {
        if shared.stop_requested.load(Ordering::SeqCst) {
            return;
        }
        let chunk = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(user = %shared.username, error = %e, "proxy stream read failed");
                shared.send(OutboundMessage::Error { content: format!("上游流读取失败: {e}") });
                return;
            }
        };
        let text = String::from_utf8_lossy(&chunk);
        for payload in parser.push(&text) {
            match serde_json::from_str::<ChatEvent>(&payload) {
                Ok(event) => shared.send(OutboundMessage::single_event(event)),
                Err(e) => debug!(error = %e, "skipping unparsable upstream event"),
            }
        }
    }
}
