// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dd-core: shared types for the docdesk document-assistant backend.
//!
//! Holds the configuration model, the clock abstraction, token generation,
//! the document index data model, and the chat message model. Everything
//! here is runtime-agnostic; services live in the sibling crates.

pub mod chat;
pub mod clock;
pub mod config;
pub mod document;
pub mod id;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use chat::{ChatMessage, Role, ToolCall, ToolCallFunction};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, ConfigError};
pub use document::{
    DocType, DocumentRoots, IndexedFile, Metadata, PROJECT_STATUSES, SEARCHABLE_DOC_EXTS,
    STATUS_RECORDS,
};
pub use id::{
    new_cache_buster, new_edit_file_key, new_edit_user_id, new_file_token, new_session_id,
};
