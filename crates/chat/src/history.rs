// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort conversation history dumps.

use dd_core::ChatMessage;
use std::path::Path;
use tracing::{info, warn};

/// Dump a conversation as JSON under `<root>/<username>/<session_id>.json`.
/// Failures are logged, never raised; history is a convenience, not a
/// durability promise.
pub async fn persist_history(
    root: &Path,
    username: &str,
    session_id: &str,
    history: &[ChatMessage],
) {
    if history.is_empty() {
        return;
    }
    let dir = root.join(username);
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        warn!(dir = %dir.display(), error = %e, "history dir creation failed");
        return;
    }
    let path = dir.join(format!("{session_id}.json"));
    let json = match serde_json::to_vec_pretty(history) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "history serialization failed");
            return;
        }
    };
    match tokio::fs::write(&path, json).await {
        Ok(()) => info!(path = %path.display(), messages = history.len(), "history persisted"),
        Err(e) => warn!(path = %path.display(), error = %e, "history write failed"),
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
