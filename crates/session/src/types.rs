// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-user session records.

use dd_core::DocType;
use dd_wire::OutboundMessage;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// One instruction to a session's WebSocket writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkMessage {
    /// Serialize and send as a text frame.
    Event(OutboundMessage),
    /// Send a close frame and stop writing.
    Close { code: u16, reason: String },
}

/// Send-only handle to a session's WebSocket writer task.
///
/// The socket itself lives with the connection handler; the session layer
/// only ever pushes down this channel, so no lock is held across socket
/// I/O and the connection handler stays the socket's single writer.
pub type SessionSink = mpsc::UnboundedSender<SinkMessage>;

/// An opened file: a download capability with an expiry.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub token: String,
    pub rel_path: String,
    pub doc_type: DocType,
    pub opened_by_llm: bool,
    pub opened_by_user: bool,
    pub expire_at: f64,
}

impl FileEntry {
    pub fn file_name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }

    /// Lowercased extension for the client's viewer choice.
    pub fn format(&self) -> String {
        match self.file_name().rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => String::new(),
        }
    }
}

/// The user's working directory: one project subtree with its own token and
/// a token per file. Replaced wholesale, never merged.
#[derive(Debug, Clone, Serialize)]
pub struct DirEntry {
    pub directory: String,
    pub directory_token: String,
    pub expire_at: f64,
    pub files: Vec<FileEntry>,
}

/// Collaborative-edit registration. One `file_key` per document, one
/// `user_id` per collaborator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EditingFile {
    pub user_id: String,
    pub file_key: String,
    pub file_path: String,
}

/// Everything the server holds for one logged-in user.
pub struct UserSession {
    pub username: String,
    pub session_id: String,
    pub ip_address: String,
    pub login_time: f64,
    pub last_activity: f64,
    pub sink: Option<SessionSink>,
    pub ws_connected: bool,
    pub working_files: Vec<FileEntry>,
    pub working_directory: Option<DirEntry>,
    pub editing: EditingFile,
}

impl UserSession {
    pub fn new(username: String, session_id: String, ip_address: String, now: f64) -> Self {
        Self {
            username,
            session_id,
            ip_address,
            login_time: now,
            last_activity: now,
            sink: None,
            ws_connected: false,
            working_files: Vec::new(),
            working_directory: None,
            editing: EditingFile::default(),
        }
    }
}

/// A resolved download token.
#[derive(Debug, Clone)]
pub struct DownloadableFile {
    pub token: String,
    pub rel_path: String,
    pub file_name: String,
    pub doc_type: DocType,
    pub abs_path: PathBuf,
    pub expire_at: f64,
}
