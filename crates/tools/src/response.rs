// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serialized response shapes shared by the tools.

use serde::Serialize;

/// The baseline `{content, hint, …}` shape most tools answer with.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolResponse {
    pub content: String,
    pub hint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl ToolResponse {
    pub fn new(content: impl Into<String>, hint: impl Into<String>) -> Self {
        Self { content: content.into(), hint: hint.into(), ..Self::default() }
    }

    pub fn with_download(
        mut self,
        token: String,
        download_url: String,
        file_path: String,
    ) -> Self {
        self.token = Some(token);
        self.download_url = Some(download_url);
        self.file_path = Some(file_path);
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"content":"serialize failed: {e}","hint":"请联系管理员。"}}"#)
        })
    }
}

/// A candidate file from spec retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct SpecFileHit {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// Spec retrieval response: either a ranked candidate list or the read
/// content of the best match.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpecFilesResponse {
    pub content: String,
    pub hint: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<SpecFileHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl SpecFilesResponse {
    pub fn message(content: impl Into<String>, hint: impl Into<String>) -> Self {
        Self { content: content.into(), hint: hint.into(), ..Self::default() }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"content":"serialize failed: {e}","hint":"请联系管理员。"}}"#)
        })
    }
}

/// Two-file diff response with a download capability per side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffResponse {
    pub content: String,
    pub hint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url2: Option<String>,
}

impl DiffResponse {
    pub fn failure(hint: impl Into<String>) -> Self {
        Self { content: "N/A".to_string(), hint: hint.into(), ..Self::default() }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"content":"serialize failed: {e}","hint":"请联系管理员。"}}"#)
        })
    }
}
