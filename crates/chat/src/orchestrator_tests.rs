// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dd_core::Role;
use dd_tools::{EmbeddingClient, KbClient, ToolEnv, ToolHost};
use std::sync::Arc;
use tokio::sync::mpsc;

fn orchestrator_in(
    base: &std::path::Path,
) -> (ChatOrchestrator, mpsc::UnboundedReceiver<SinkMessage>) {
    let mut config = dd_core::test_support::test_config(base);
    // unroutable upstream so no test ever talks to a real endpoint
    config.llm.api_base = "http://127.0.0.1:1/v1".to_string();
    config.llm.model = "test-model".to_string();
    config.llm.system_prompt = "你是助手".to_string();
    let config = Arc::new(config);

    let roots = config.document_roots();
    let http = reqwest::Client::new();
    let env = ToolEnv {
        sessions: Arc::new(dd_session::SessionManager::new(roots.clone(), 3600, 60)),
        index: Arc::new(
            dd_index::IndexService::new(roots, ":memory:", 2, Vec::new()).unwrap(),
        ),
        projects_fs: Arc::new(
            dd_files::FileService::new(config.roots.projects_root.clone()).unwrap(),
        ),
        embeddings: Arc::new(EmbeddingClient::new(http.clone(), config.embedding.clone())),
        kb: Arc::new(KbClient::new(http.clone(), config.kb.clone())),
        config: Arc::clone(&config),
    };
    let tools = Arc::new(ToolHost::new(env));
    let client = Arc::new(LlmClient::new(http, config.llm.clone()));

    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = ChatOrchestrator::new(client, tools, config, tx, "alice");
    (orchestrator, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SinkMessage>) -> Vec<OutboundMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let SinkMessage::Event(event) = msg {
            out.push(event);
        }
    }
    out
}

#[tokio::test]
async fn depth_bound_emits_single_error_without_upstream_call() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, mut rx) = orchestrator_in(dir.path());

    let depth = orchestrator.shared.config.llm.max_tool_depth + 1;
    run_completion(
        Arc::clone(&orchestrator.shared),
        "c1".to_string(),
        "t1".to_string(),
        depth,
    )
    .await;

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        OutboundMessage::Error { content } => assert!(content.contains("递归")),
        other => panic!("expected error envelope, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_upstream_yields_error_then_message_end() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, mut rx) = orchestrator_in(dir.path());

    orchestrator
        .handle_query(QueryMessage {
            query: "列出2024年的项目".to_string(),
            conversation_id: Some("c9".to_string()),
            inputs: None,
        })
        .await;
    orchestrator.wait_inflight().await;

    let messages = drain(&mut rx);
    assert!(matches!(messages.first(), Some(OutboundMessage::Error { .. })));
    match messages.last() {
        Some(OutboundMessage::ChatEventBatch { payload }) => {
            assert_eq!(payload[0].event, "message_end");
            assert_eq!(payload[0].conversation_id.as_deref(), Some("c9"));
        }
        other => panic!("expected message_end batch, got {other:?}"),
    }

    // history keeps the seeded system turn and the user turn
    let history = orchestrator.history_snapshot().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::System);
    assert!(history[0].content.contains("alice"));
    assert_eq!(history[1].role, Role::User);
}

#[tokio::test]
async fn stop_acks_and_cancels() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, mut rx) = orchestrator_in(dir.path());

    orchestrator.handle_control(Control::StopChatStream).await;
    let messages = drain(&mut rx);
    assert!(matches!(messages.as_slice(), [OutboundMessage::StopRequestProcessed]));
}

#[tokio::test]
async fn start_conversation_resets_history() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, mut rx) = orchestrator_in(dir.path());

    orchestrator
        .handle_query(QueryMessage {
            query: "第一个问题".to_string(),
            conversation_id: None,
            inputs: None,
        })
        .await;
    orchestrator.wait_inflight().await;
    assert!(orchestrator.history_snapshot().await.len() >= 2);

    orchestrator
        .handle_control(Control::StartConversation { conversation_id: "fresh".to_string() })
        .await;
    let history = orchestrator.history_snapshot().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::System);
    let _ = drain(&mut rx);
}

#[tokio::test]
async fn persist_writes_history_dump() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, _rx) = orchestrator_in(dir.path());

    orchestrator
        .handle_query(QueryMessage {
            query: "问题".to_string(),
            conversation_id: None,
            inputs: None,
        })
        .await;
    orchestrator.wait_inflight().await;
    orchestrator.persist("session-1").await;

    let path = orchestrator
        .shared
        .config
        .roots
        .conversation_root
        .join("alice/session-1.json");
    assert!(path.is_file());
}
