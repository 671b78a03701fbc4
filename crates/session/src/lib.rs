// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dd-session: per-user session state.
//!
//! One mutex guards the whole user map; every public method locks on entry
//! and releases on return. WebSocket pushes go through send-only channels,
//! so nothing here blocks on the network while holding the lock.

mod types;

pub use types::{
    DirEntry, DownloadableFile, EditingFile, FileEntry, SessionSink, SinkMessage, UserSession,
};

use dd_core::{new_edit_file_key, new_edit_user_id, new_file_token, Clock, DocType, DocumentRoots, SystemClock};
use dd_wire::{DirectoryFilePayload, DirectoryPayload, FileOpenPayload, OutboundMessage};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of validating a cookie against the in-memory session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionValidation {
    Ok,
    /// No session for that user.
    Missing,
    /// A session exists but under a different session id.
    Conflict,
    /// The session idled out.
    Expired,
}

/// All per-user server state, plus the sweepers that age it out.
pub struct SessionManager<C: Clock = SystemClock> {
    users: Mutex<HashMap<String, UserSession>>,
    clock: C,
    roots: DocumentRoots,
    inactivity_timeout: f64,
    link_validity: f64,
}

impl SessionManager<SystemClock> {
    pub fn new(roots: DocumentRoots, inactivity_timeout_secs: u64, link_validity_secs: u64) -> Self {
        Self::with_clock(roots, inactivity_timeout_secs, link_validity_secs, SystemClock)
    }
}

impl<C: Clock> SessionManager<C> {
    pub fn with_clock(
        roots: DocumentRoots,
        inactivity_timeout_secs: u64,
        link_validity_secs: u64,
        clock: C,
    ) -> Self {
        info!(
            inactivity_timeout_secs,
            link_validity_secs, "session manager initialized"
        );
        Self {
            users: Mutex::new(HashMap::new()),
            clock,
            roots,
            inactivity_timeout: inactivity_timeout_secs as f64,
            link_validity: link_validity_secs as f64,
        }
    }

    // --- login / logout ---

    /// Exclusive login: refuse while another session for the same user is
    /// inside the idle window. A successful login replaces any stale record.
    pub fn attempt_login(&self, username: &str, ip_address: &str, new_session_id: &str) -> bool {
        let now = self.clock.epoch_secs();
        let mut users = self.users.lock();
        if let Some(existing) = users.get(username) {
            if now - existing.last_activity < self.inactivity_timeout {
                warn!(
                    user = %username,
                    active_session = %existing.session_id,
                    attempt_ip = %ip_address,
                    "login rejected, user active elsewhere"
                );
                return false;
            }
        }
        users.insert(
            username.to_string(),
            UserSession::new(
                username.to_string(),
                new_session_id.to_string(),
                ip_address.to_string(),
                now,
            ),
        );
        info!(user = %username, ip = %ip_address, "login");
        true
    }

    /// Drop the session. An attached socket gets a 1000 "logout" close; a
    /// dead channel is ignored.
    pub fn logout(&self, username: &str) -> bool {
        let mut users = self.users.lock();
        let Some(session) = users.remove(username) else {
            return false;
        };
        if let Some(sink) = session.sink {
            let _ = sink.send(SinkMessage::Close { code: 1000, reason: "logout".to_string() });
        }
        info!(user = %username, "logout");
        true
    }

    // --- websocket attach / detach ---

    /// Attach a socket sink, verifying the session id under the lock so a
    /// concurrent idle-sweep logout cannot slip between check and attach.
    pub fn connect_websocket(
        &self,
        username: &str,
        session_id: &str,
        sink: SessionSink,
    ) -> Result<(), SessionSink> {
        let mut users = self.users.lock();
        match users.get_mut(username) {
            Some(session) if session.session_id == session_id => {
                session.sink = Some(sink);
                session.ws_connected = true;
                info!(user = %username, "websocket attached");
                Ok(())
            }
            _ => {
                warn!(user = %username, "websocket attach with invalid session");
                Err(sink)
            }
        }
    }

    pub fn disconnect_websocket(&self, username: &str) {
        let mut users = self.users.lock();
        if let Some(session) = users.get_mut(username) {
            session.sink = None;
            session.ws_connected = false;
            debug!(user = %username, "websocket detached");
        }
    }

    // --- activity / validation ---

    pub fn set_http_activity(&self, username: &str) {
        let now = self.clock.epoch_secs();
        if let Some(session) = self.users.lock().get_mut(username) {
            session.last_activity = now;
        }
    }

    /// Strict cookie check used by the auth middleware.
    pub fn validate_session(&self, username: &str, session_id: &str) -> SessionValidation {
        let now = self.clock.epoch_secs();
        let users = self.users.lock();
        match users.get(username) {
            None => SessionValidation::Missing,
            Some(session) if session.session_id != session_id => SessionValidation::Conflict,
            Some(session) if now - session.last_activity >= self.inactivity_timeout => {
                SessionValidation::Expired
            }
            Some(_) => SessionValidation::Ok,
        }
    }

    pub fn session_id_of(&self, username: &str) -> Option<String> {
        self.users.lock().get(username).map(|s| s.session_id.clone())
    }

    /// Reverse lookup used by the WebSocket attach path.
    pub fn username_by_session_id(&self, session_id: &str) -> Option<String> {
        self.users
            .lock()
            .values()
            .find(|s| s.session_id == session_id)
            .map(|s| s.username.clone())
    }

    // --- working files ---

    /// Mint a token for an opened file, append it to the working set, and
    /// notify the client over the attached socket.
    pub fn update_opened_file(
        &self,
        username: &str,
        rel_path: &str,
        opened_by_llm: bool,
        doc_type: DocType,
    ) -> Option<FileEntry> {
        let now = self.clock.epoch_secs();
        let mut users = self.users.lock();
        let session = users.get_mut(username)?;
        let entry = FileEntry {
            token: new_file_token(),
            rel_path: rel_path.to_string(),
            doc_type,
            opened_by_llm,
            opened_by_user: !opened_by_llm,
            expire_at: now + self.link_validity,
        };
        session.working_files.push(entry.clone());
        push(session, OutboundMessage::FileOpenRequest {
            payload: FileOpenPayload {
                filename: entry.file_name().to_string(),
                download_token: entry.token.clone(),
                format: entry.format(),
            },
        });
        debug!(user = %username, path = %rel_path, token = %entry.token, "file opened");
        Some(entry)
    }

    /// Replace the working directory with a fresh one. Prior directory
    /// tokens die with the record they lived in.
    pub fn update_opened_dir(
        &self,
        username: &str,
        dir_path: &str,
        rel_paths: Vec<String>,
        doc_type: DocType,
    ) -> Option<DirEntry> {
        let now = self.clock.epoch_secs();
        let expire_at = now + self.link_validity;
        let mut users = self.users.lock();
        let session = users.get_mut(username)?;
        let files: Vec<FileEntry> = rel_paths
            .into_iter()
            .map(|rel_path| FileEntry {
                token: new_file_token(),
                rel_path,
                doc_type,
                opened_by_llm: true,
                opened_by_user: false,
                expire_at,
            })
            .collect();
        let entry = DirEntry {
            directory: dir_path.to_string(),
            directory_token: new_file_token(),
            expire_at,
            files,
        };
        session.working_directory = Some(entry.clone());
        push(session, OutboundMessage::DirectoryUpdate {
            payload: DirectoryPayload {
                directory: entry.directory.clone(),
                directory_token: entry.directory_token.clone(),
                files: entry
                    .files
                    .iter()
                    .map(|f| DirectoryFilePayload {
                        filename: f.file_name().to_string(),
                        file_path: f.rel_path.clone(),
                        download_token: f.token.clone(),
                        format: f.format(),
                    })
                    .collect(),
            },
        });
        info!(user = %username, dir = %dir_path, files = entry.files.len(), "working directory set");
        Some(entry)
    }

    /// Directory path of the user's current working directory, if any.
    pub fn working_directory_of(&self, username: &str) -> Option<String> {
        self.users
            .lock()
            .get(username)
            .and_then(|s| s.working_directory.as_ref())
            .map(|d| d.directory.clone())
    }

    pub fn clear_working_directory(&self, username: &str) {
        if let Some(session) = self.users.lock().get_mut(username) {
            session.working_directory = None;
        }
    }

    /// Direct event push to a user's socket, if one is attached.
    pub fn push_event(&self, username: &str, message: OutboundMessage) {
        if let Some(session) = self.users.lock().get_mut(username) {
            push(session, message);
        }
    }

    // --- collaborative edit ---

    /// Register (or join) a collaborative edit of `file_path`. The file key
    /// is shared across collaborators; the user id is always fresh.
    pub fn register_editing_file(&self, username: &str, file_path: &str) -> Option<(String, String)> {
        let mut users = self.users.lock();
        let file_key = users
            .values()
            .find(|s| !s.editing.file_key.is_empty() && s.editing.file_path == file_path)
            .map(|s| s.editing.file_key.clone())
            .unwrap_or_else(new_edit_file_key);
        let session = users.get_mut(username)?;
        let user_id = new_edit_user_id();
        session.editing = EditingFile {
            user_id: user_id.clone(),
            file_key: file_key.clone(),
            file_path: file_path.to_string(),
        };
        info!(user = %username, path = %file_path, key = %file_key, "editing registered");
        Some((user_id, file_key))
    }

    /// First session holding the key wins; they all share one path anyway.
    pub fn get_editing_file(&self, file_key: &str) -> Option<String> {
        self.users
            .lock()
            .values()
            .find(|s| s.editing.file_key == file_key && !file_key.is_empty())
            .map(|s| s.editing.file_path.clone())
    }

    pub fn remove_editing_file(&self, file_key: &str) {
        if file_key.is_empty() {
            return;
        }
        let mut users = self.users.lock();
        for session in users.values_mut() {
            if session.editing.file_key == file_key {
                session.editing = EditingFile::default();
            }
        }
    }

    // --- token resolution ---

    /// Resolve a download token across every session's working files and
    /// working directory. Expired entries do not resolve.
    pub fn get_downloadable_file_info(&self, token: &str) -> Option<DownloadableFile> {
        let now = self.clock.epoch_secs();
        let users = self.users.lock();
        for session in users.values() {
            let direct = session.working_files.iter().find(|f| f.token == token);
            let in_dir = session
                .working_directory
                .iter()
                .flat_map(|d| d.files.iter())
                .find(|f| f.token == token);
            if let Some(entry) = direct.or(in_dir) {
                if entry.expire_at <= now {
                    debug!(token = %token, "token expired");
                    return None;
                }
                return Some(DownloadableFile {
                    token: entry.token.clone(),
                    rel_path: entry.rel_path.clone(),
                    file_name: entry.file_name().to_string(),
                    doc_type: entry.doc_type,
                    abs_path: self.roots.absolute(entry.doc_type, &entry.rel_path),
                    expire_at: entry.expire_at,
                });
            }
        }
        None
    }

    // --- sweepers ---

    /// Drop expired file tokens; a working directory past its own expiry
    /// goes with them.
    pub fn cleanup_expired_opened_files(&self) {
        let now = self.clock.epoch_secs();
        let mut users = self.users.lock();
        for session in users.values_mut() {
            let before = session.working_files.len();
            session.working_files.retain(|f| f.expire_at > now);
            let dropped = before - session.working_files.len();
            if dropped > 0 {
                debug!(user = %session.username, dropped, "expired file tokens swept");
            }
            if session
                .working_directory
                .as_ref()
                .map(|d| d.expire_at <= now)
                .unwrap_or(false)
            {
                session.working_directory = None;
                debug!(user = %session.username, "expired working directory swept");
            }
        }
    }

    /// Evict sessions past the idle timeout, closing any attached socket
    /// with 1001. Returns the evicted usernames.
    pub fn process_inactive_sessions(&self) -> Vec<String> {
        let now = self.clock.epoch_secs();
        let mut users = self.users.lock();
        let idle: Vec<String> = users
            .values()
            .filter(|s| now - s.last_activity >= self.inactivity_timeout)
            .map(|s| s.username.clone())
            .collect();
        idle.into_iter()
            .filter_map(|username| {
                users.remove(&username).map(|session| {
                    if let Some(sink) = session.sink {
                        let _ = sink.send(SinkMessage::Close {
                            code: 1001,
                            reason: "session expired".to_string(),
                        });
                    }
                    info!(user = %username, "session evicted for inactivity");
                    username
                })
            })
            .collect()
    }

    // --- diagnostics ---

    /// Debug snapshot of every session, shaped for the status endpoint.
    pub fn session_states(&self) -> serde_json::Value {
        let now = self.clock.epoch_secs();
        let users = self.users.lock();
        let sessions: Vec<serde_json::Value> = users
            .values()
            .map(|s| {
                serde_json::json!({
                    "username": &s.username,
                    "session_id": &s.session_id,
                    "ip_address": &s.ip_address,
                    "login_time": s.login_time,
                    "idle_secs": now - s.last_activity,
                    "ws_connected": s.ws_connected,
                    "working_files": &s.working_files,
                    "working_directory": &s.working_directory,
                    "editing_file": &s.editing,
                })
            })
            .collect();
        serde_json::json!({ "count": sessions.len(), "sessions": sessions })
    }

    pub fn active_user_count(&self) -> usize {
        self.users.lock().len()
    }
}

/// Fire-and-forget channel send; a detached socket just drops the event.
fn push(session: &mut UserSession, message: OutboundMessage) {
    if let Some(sink) = &session.sink {
        if sink.send(types::SinkMessage::Event(message)).is_err() {
            session.sink = None;
            session.ws_connected = false;
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
