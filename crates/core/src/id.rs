// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token and identifier generation.
//!
//! Every capability handed to a client is an opaque lowercase-hex string cut
//! from a v4 UUID. Download tokens and session ids use the full 32 hex chars;
//! the shorter forms are for collaborative-edit coordination and the preview
//! proxy's cache buster.

use uuid::Uuid;

fn hex32() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Fresh 32-hex download token for an opened file or directory.
pub fn new_file_token() -> String {
    hex32()
}

/// Fresh 32-hex session id minted at login.
pub fn new_session_id() -> String {
    hex32()
}

/// 8-hex filename suffix used to defeat the preview service's content cache.
pub fn new_cache_buster() -> String {
    hex32()[..8].to_string()
}

/// 8-hex per-collaborator user id for the external editor.
pub fn new_edit_user_id() -> String {
    hex32()[..8].to_string()
}

/// 20-hex document key shared by all collaborators editing one file.
pub fn new_edit_file_key() -> String {
    hex32()[..20].to_string()
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
