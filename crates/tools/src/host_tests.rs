// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::embed::EmbeddingClient;
use crate::env::ToolEnv;
use crate::kb::KbClient;
use async_trait::async_trait;
use dd_files::FileService;
use dd_index::IndexService;
use dd_session::SessionManager;
use std::sync::Arc;

pub(crate) fn test_env(base: &std::path::Path) -> ToolEnv {
    let config = Arc::new(dd_core::test_support::test_config(base));
    let roots = config.document_roots();
    let http = reqwest::Client::new();
    ToolEnv {
        sessions: Arc::new(SessionManager::new(
            roots.clone(),
            config.session.inactivity_timeout_secs,
            config.session.download_link_validity_secs,
        )),
        index: Arc::new(
            IndexService::new(
                roots,
                ":memory:",
                config.index.watcher_cooldown_secs,
                config.index.allowed_file_types.clone(),
            )
            .unwrap(),
        ),
        projects_fs: Arc::new(FileService::new(config.roots.projects_root.clone()).unwrap()),
        embeddings: Arc::new(EmbeddingClient::new(http.clone(), config.embedding.clone())),
        kb: Arc::new(KbClient::new(http, config.kb.clone())),
        config,
    }
}

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": "echo",
                "description": "echoes its input",
                "parameters": { "type": "object", "properties": {} }
            }
        })
    }

    async fn invoke(&self, _env: &ToolEnv, user: &str, args: Value) -> String {
        serde_json::json!({ "user": user, "args": args }).to_string()
    }
}

#[tokio::test]
async fn registry_surfaces_schemas() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = ToolHost::new(test_env(dir.path()));
    host.register(Arc::new(EchoTool));

    assert_eq!(host.names(), vec!["echo"]);
    let schemas = host.schemas();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0]["function"]["name"], "echo");
}

#[tokio::test]
async fn invoke_routes_to_tool_with_parsed_args() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = ToolHost::new(test_env(dir.path()));
    host.register(Arc::new(EchoTool));

    let out = host.invoke("echo", "alice", r#"{"k":1}"#).await;
    let json: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["user"], "alice");
    assert_eq!(json["args"]["k"], 1);
}

#[tokio::test]
async fn empty_arguments_become_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = ToolHost::new(test_env(dir.path()));
    host.register(Arc::new(EchoTool));

    let out = host.invoke("echo", "alice", "").await;
    let json: Value = serde_json::from_str(&out).unwrap();
    assert!(json["args"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_tool_and_bad_args_are_error_shaped() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = ToolHost::new(test_env(dir.path()));
    host.register(Arc::new(EchoTool));

    let out = host.invoke("missing", "alice", "{}").await;
    let json: Value = serde_json::from_str(&out).unwrap();
    assert!(json["content"].as_str().unwrap().contains("未知工具"));

    let out = host.invoke("echo", "alice", "not json").await;
    let json: Value = serde_json::from_str(&out).unwrap();
    assert!(json["content"].as_str().unwrap().contains("JSON"));
    assert!(json.get("hint").is_some());
}

#[tokio::test]
async fn builtin_set_registers_all_six() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = ToolHost::new(test_env(dir.path()));
    crate::register_builtin_tools(&mut host);
    let names = host.names();
    for expected in [
        "diff_project_file",
        "open_specification_files",
        "query_project_files",
        "query_specification_knowledge_base",
        "read_project_file",
        "write_review_doc",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing tool {expected}");
    }
}
