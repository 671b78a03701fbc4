// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The environment handed to every tool invocation.
//!
//! Tools never receive the session manager or index directly through their
//! arguments; the host passes this struct so adding a dependency does not
//! ripple through every tool signature.

use crate::embed::EmbeddingClient;
use crate::kb::KbClient;
use dd_core::{Config, DocType};
use dd_files::FileService;
use dd_index::IndexService;
use dd_session::SessionManager;
use std::sync::Arc;

/// Shared services for tool handlers. Cheap to clone.
#[derive(Clone)]
pub struct ToolEnv {
    pub sessions: Arc<SessionManager>,
    pub index: Arc<IndexService>,
    pub projects_fs: Arc<FileService>,
    pub embeddings: Arc<EmbeddingClient>,
    pub kb: Arc<KbClient>,
    pub config: Arc<Config>,
}

impl ToolEnv {
    /// Download link for a token, as served by the download gateway.
    pub fn download_url(&self, token: &str, file_name: &str) -> String {
        format!("/download/{token}/{file_name}")
    }

    /// Register a single opened file on the user's session and return
    /// `(token, download_url)` when a session exists.
    pub fn register_opened_file(
        &self,
        user: &str,
        rel_path: &str,
        doc_type: DocType,
    ) -> Option<(String, String)> {
        let entry = self.sessions.update_opened_file(user, rel_path, true, doc_type)?;
        let url = self.download_url(&entry.token, entry.file_name());
        Some((entry.token, url))
    }
}
