// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, loaded from a TOML file.
//!
//! Every tunable has a default so a minimal config only names the document
//! roots and the upstream endpoints it actually uses. Secrets (session
//! secret, API keys) are plain strings here; the file is expected to be
//! operator-owned with restrictive permissions.

use crate::document::DocumentRoots;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub roots: RootsConfig,
    pub index: IndexConfig,
    pub session: SessionConfig,
    pub llm: LlmConfig,
    pub upstream: UpstreamConfig,
    pub kb: KbConfig,
    pub embedding: EmbeddingConfig,
    pub preview: PreviewConfig,
    pub editor: EditorConfig,
}

impl Config {
    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Ok(toml::from_str(&text)?)
    }

    pub fn document_roots(&self) -> DocumentRoots {
        DocumentRoots {
            projects: self.roots.projects_root.clone(),
            specs: self.roots.spec_root.clone(),
            management: self.roots.management_root.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host; `None` binds the unspecified dual-stack address.
    pub host: Option<String>,
    pub port: u16,
    /// HMAC key for the session cookie. Generated at startup when empty.
    pub session_secret: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: None, port: 8888, session_secret: String::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RootsConfig {
    pub projects_root: PathBuf,
    pub spec_root: PathBuf,
    pub management_root: PathBuf,
    /// Where per-user chat history JSON dumps land.
    pub conversation_root: PathBuf,
    /// Fallback output directory for generated review documents.
    pub output_root: PathBuf,
    /// Directory holding the review-doc templates and their manuals.
    pub template_root: PathBuf,
}

impl Default for RootsConfig {
    fn default() -> Self {
        Self {
            projects_root: PathBuf::from("data/projects"),
            spec_root: PathBuf::from("data/specs"),
            management_root: PathBuf::from("data/management"),
            conversation_root: PathBuf::from("chat_history"),
            output_root: PathBuf::from("data/generated"),
            template_root: PathBuf::from("data/templates"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// SQLite path; `:memory:` opts out of persistence across restarts.
    pub store_path: String,
    pub watcher_cooldown_secs: u64,
    pub scan_cron_hour: u32,
    pub scan_cron_minute: u32,
    /// Extensions (lowercase, no dot) recorded for the spec root and offered
    /// to the retrieval tool.
    pub allowed_file_types: Vec<String>,
    /// Category directory names expected directly under the spec root.
    pub spec_dirs: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            store_path: "data/index.db".to_string(),
            watcher_cooldown_secs: 2,
            scan_cron_hour: 23,
            scan_cron_minute: 0,
            allowed_file_types: ["pdf", "md", "docx", "txt", "ofd", "ceb", "jpeg", "jpg", "png"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            spec_dirs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub download_link_validity_secs: u64,
    pub cleanup_interval_secs: u64,
    pub inactivity_timeout_secs: u64,
    /// username → password. A stand-in for a real credential store.
    pub users: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            download_link_validity_secs: 3600,
            cleanup_interval_secs: 60,
            inactivity_timeout_secs: 3600,
            users: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    /// Character budget applied when tool output is fed back to the model.
    pub model_context_window: usize,
    pub max_tool_depth: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: String::new(),
            system_prompt: String::new(),
            model_context_window: 64_000,
            max_tool_depth: 5,
        }
    }
}

/// Legacy Dify-style streaming agent reached by the SSE bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub chat_url: String,
    pub api_key: String,
    pub http_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { chat_url: String::new(), api_key: String::new(), http_timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KbConfig {
    pub url: String,
    pub api_key: String,
    pub top_k: usize,
    pub rerank_model: String,
    pub rerank_provider: String,
    pub rerank_enable: bool,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            top_k: 5,
            rerank_model: "gte-rerank-v2".to_string(),
            rerank_provider: "Tongyi".to_string(),
            rerank_enable: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { url: String::new(), api_key: String::new(), model: "bge-m3".to_string() }
    }
}

/// kkFileView-compatible preview service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub base_url: String,
    pub http_timeout_secs: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { base_url: String::new(), http_timeout_secs: 60 }
    }
}

/// OnlyOffice-compatible collaborative editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub jwt_secret: String,
    pub jwt_enable: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { jwt_secret: String::new(), jwt_enable: false }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
