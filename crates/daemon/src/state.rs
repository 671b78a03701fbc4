// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared handler state: every service the routes reach for.

use dd_chat::LlmClient;
use dd_core::{Config, DocType};
use dd_files::FileService;
use dd_index::IndexService;
use dd_session::SessionManager;
use dd_tools::ToolHost;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionManager>,
    pub index: Arc<IndexService>,
    pub projects_fs: Arc<FileService>,
    pub specs_fs: Arc<FileService>,
    pub management_fs: Arc<FileService>,
    pub tools: Arc<ToolHost>,
    pub llm: Arc<LlmClient>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn secret(&self) -> &str {
        &self.config.server.session_secret
    }

    pub fn fs_for(&self, doc_type: DocType) -> &Arc<FileService> {
        match doc_type {
            DocType::Project => &self.projects_fs,
            DocType::Spec => &self.specs_fs,
            DocType::Management => &self.management_fs,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_state(base: &std::path::Path) -> AppState {
    use dd_tools::{register_builtin_tools, EmbeddingClient, KbClient, ToolEnv};

    #[allow(clippy::unwrap_used)]
    fn build(base: &std::path::Path) -> AppState {
        let config = Arc::new(dd_core::test_support::test_config(base));
        let roots = config.document_roots();
        let http = reqwest::Client::new();
        let sessions = Arc::new(SessionManager::new(
            roots.clone(),
            config.session.inactivity_timeout_secs,
            config.session.download_link_validity_secs,
        ));
        let index = Arc::new(
            IndexService::new(
                roots,
                ":memory:",
                config.index.watcher_cooldown_secs,
                config.index.allowed_file_types.clone(),
            )
            .unwrap(),
        );
        let projects_fs =
            Arc::new(FileService::new(config.roots.projects_root.clone()).unwrap());
        let specs_fs = Arc::new(FileService::new(config.roots.spec_root.clone()).unwrap());
        let management_fs =
            Arc::new(FileService::new(config.roots.management_root.clone()).unwrap());
        let mut tools = dd_tools::ToolHost::new(ToolEnv {
            sessions: Arc::clone(&sessions),
            index: Arc::clone(&index),
            projects_fs: Arc::clone(&projects_fs),
            embeddings: Arc::new(EmbeddingClient::new(http.clone(), config.embedding.clone())),
            kb: Arc::new(KbClient::new(http.clone(), config.kb.clone())),
            config: Arc::clone(&config),
        });
        register_builtin_tools(&mut tools);
        let llm = Arc::new(LlmClient::new(http.clone(), config.llm.clone()));
        AppState {
            config,
            sessions,
            index,
            projects_fs,
            specs_fs,
            management_fs,
            tools: Arc::new(tools),
            llm,
            http,
        }
    }
    build(base)
}
