// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket endpoints: the tool-calling chat loop and the legacy SSE
//! bridge. Both attach through the SessionManager so outbound pushes share
//! one writer task per socket.

use crate::state::AppState;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use dd_chat::{ChatOrchestrator, StreamProxy};
use dd_session::SinkMessage;
use dd_wire::ClientMessage;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `WS /ws/v2/chat` — the OpenAI-compatible orchestrator.
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state, query.session_id, Flavor::Orchestrated))
}

/// `WS /ws_chat_stream` — the legacy SSE bridge.
pub async fn legacy_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state, query.session_id, Flavor::Proxied))
}

#[derive(Clone, Copy)]
enum Flavor {
    Orchestrated,
    Proxied,
}

async fn serve_socket(
    mut socket: WebSocket,
    state: AppState,
    session_id: Option<String>,
    flavor: Flavor,
) {
    let Some(session_id) = session_id.filter(|s| !s.is_empty()) else {
        close(&mut socket, 1008, "session_id is required.").await;
        return;
    };
    let Some(username) = state.sessions.username_by_session_id(&session_id) else {
        close(&mut socket, 1008, "Invalid or expired session_id.").await;
        return;
    };

    // the session verifies the id again under its own lock — a sweep racing
    // the lookup above loses here, not later
    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel::<SinkMessage>();
    let handler_sink = sink_tx.clone();
    if state.sessions.connect_websocket(&username, &session_id, sink_tx).is_err() {
        close(&mut socket, 1008, "Invalid session").await;
        return;
    }
    info!(user = %username, "websocket open");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // single writer: everything the session or orchestrator emits funnels
    // through this task
    let writer = tokio::spawn(async move {
        while let Some(message) = sink_rx.recv().await {
            match message {
                SinkMessage::Event(event) => {
                    if ws_tx.send(Message::Text(event.to_json())).await.is_err() {
                        break;
                    }
                }
                SinkMessage::Close { code, reason } => {
                    let _ = ws_tx
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    let orchestrator = match flavor {
        Flavor::Orchestrated => Some(ChatOrchestrator::new(
            Arc::clone(&state.llm),
            Arc::clone(&state.tools),
            Arc::clone(&state.config),
            handler_sink.clone(),
            username.clone(),
        )),
        Flavor::Proxied => None,
    };
    let proxy = match flavor {
        Flavor::Proxied => Some(StreamProxy::new(
            state.http.clone(),
            state.config.upstream.clone(),
            handler_sink,
            username.clone(),
        )),
        Flavor::Orchestrated => None,
    };

    while let Some(frame) = ws_rx.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let message = match ClientMessage::parse(&text) {
            Ok(message) => message,
            Err(e) => {
                debug!(user = %username, error = %e, "unparsable client frame");
                state.sessions.push_event(
                    &username,
                    dd_wire::OutboundMessage::Error { content: format!("无法解析消息: {e}") },
                );
                continue;
            }
        };
        match (&orchestrator, &proxy, message) {
            (Some(orch), _, ClientMessage::Control(control)) => orch.handle_control(control).await,
            (Some(orch), _, ClientMessage::Query(query)) => orch.handle_query(query).await,
            (_, Some(proxy), ClientMessage::Control(control)) => {
                proxy.handle_control(control).await
            }
            (_, Some(proxy), ClientMessage::Query(query)) => proxy.handle_query(query).await,
            _ => {}
        }
    }

    // disconnect: stop streaming, dump history, detach
    if let Some(orch) = &orchestrator {
        orch.cancel_inflight().await;
        orch.persist(&session_id).await;
    }
    if let Some(proxy) = &proxy {
        proxy.cancel_inflight().await;
    }
    state.sessions.disconnect_websocket(&username);
    writer.abort();
    info!(user = %username, "websocket closed");
}

async fn close(socket: &mut WebSocket, code: u16, reason: &str) {
    if let Err(e) = socket
        .send(Message::Close(Some(CloseFrame { code, reason: reason.to_string().into() })))
        .await
    {
        warn!(error = %e, "close frame send failed");
    }
}
