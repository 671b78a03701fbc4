// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem watch + debounce.
//!
//! Creates/modifies land in a pending map (path → last touch) and are
//! upserted once they have been quiet for the cooldown. Deletes bypass the
//! debounce and hit the store from the watcher thread directly — a late
//! upsert for a deleted path is corrected by the daily rescan.

use crate::meta::is_ignored;
use crate::service::IndexInner;
use dd_core::DocType;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Pending upserts: absolute path → last event time.
pub(crate) type PendingMap = parking_lot::Mutex<HashMap<PathBuf, Instant>>;

/// Watchers plus the debounce task handle.
pub(crate) struct WatchSet {
    // Held for their Drop impls; dropping stops the watch threads.
    watchers: Vec<notify::RecommendedWatcher>,
    cancel: CancellationToken,
    debounce: Option<tokio::task::JoinHandle<()>>,
}

impl WatchSet {
    /// Install one recursive watcher per document root and start the
    /// debounce drain loop.
    pub(crate) fn start(inner: Arc<IndexInner>) -> Result<Self, notify::Error> {
        let mut watchers = Vec::with_capacity(DocType::ALL.len());
        for doc_type in DocType::ALL {
            let root = inner.roots.root_for(doc_type).to_path_buf();
            if !root.is_dir() {
                warn!(root = %root.display(), %doc_type, "document root missing, not watching");
                continue;
            }
            let inner_cb = Arc::clone(&inner);
            let mut watcher =
                notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
                    match result {
                        Ok(event) => handle_event(&inner_cb, event),
                        Err(e) => error!(error = %e, "watch error"),
                    }
                })?;
            watcher.watch(&root, RecursiveMode::Recursive)?;
            debug!(root = %root.display(), %doc_type, "watching");
            watchers.push(watcher);
        }

        let cancel = CancellationToken::new();
        let debounce = tokio::spawn(debounce_loop(Arc::clone(&inner), cancel.clone()));
        Ok(Self { watchers, cancel, debounce: Some(debounce) })
    }

    /// Stop the watchers and the debounce loop; flush pending best-effort.
    pub(crate) async fn stop(mut self) {
        self.watchers.clear();
        self.cancel.cancel();
        if let Some(handle) = self.debounce.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "debounce task join failed");
            }
        }
    }
}

/// Map a notify event onto pending upserts and immediate deletes.
fn handle_event(inner: &Arc<IndexInner>, event: Event) {
    match event.kind {
        EventKind::Create(kind) => {
            for path in &event.paths {
                // directory creations surface through their children
                if kind == CreateKind::Folder || path.is_dir() {
                    continue;
                }
                enqueue(inner, path);
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
            (RenameMode::Both, [src, dst]) => {
                delete_path(inner, src, true);
                if dst.is_dir() {
                    // moved-in directory: children populate via follow-on
                    // events or the next full scan
                    debug!(path = %dst.display(), "directory moved in, deferring to rescan");
                } else {
                    enqueue(inner, dst);
                }
            }
            (RenameMode::From, [src]) => delete_path(inner, src, true),
            (RenameMode::To, [dst]) => {
                if !dst.is_dir() {
                    enqueue(inner, dst);
                }
            }
            (_, paths) => {
                // platform gave us an untyped rename: resolve by existence
                for path in paths {
                    if path.exists() {
                        if !path.is_dir() {
                            enqueue(inner, path);
                        }
                    } else {
                        delete_path(inner, path, true);
                    }
                }
            }
        },
        EventKind::Modify(_) => {
            for path in &event.paths {
                if !path.is_dir() {
                    enqueue(inner, path);
                }
            }
        }
        EventKind::Remove(kind) => {
            for path in &event.paths {
                let recursive = !matches!(kind, RemoveKind::File);
                delete_path(inner, path, recursive);
            }
        }
        _ => {}
    }
}

fn enqueue(inner: &Arc<IndexInner>, abs: &Path) {
    let Some((_, rel)) = inner.roots.classify(abs) else {
        return;
    };
    if is_ignored(&rel) {
        return;
    }
    inner.pending.lock().insert(abs.to_path_buf(), Instant::now());
}

/// Immediate row removal, recursive for directories.
fn delete_path(inner: &Arc<IndexInner>, abs: &Path, recursive: bool) {
    let Some((doc_type, rel)) = inner.roots.classify(abs) else {
        return;
    };
    if is_ignored(&rel) {
        return;
    }
    inner.pending.lock().remove(abs);
    let rel_str = rel.to_string_lossy().replace('\\', "/");
    let result = if recursive {
        inner.store.delete_prefix(doc_type, &rel_str)
    } else {
        inner.store.delete(doc_type, &rel_str)
    };
    match result {
        Ok(n) if n > 0 => debug!(path = %rel_str, rows = n, "index rows removed"),
        Ok(_) => {}
        Err(e) => warn!(path = %rel_str, error = %e, "index delete failed"),
    }
}

/// Wake every cooldown and upsert entries whose last event has settled.
/// Entries are removed under the lock, upserted outside it.
async fn debounce_loop(inner: Arc<IndexInner>, cancel: CancellationToken) {
    let cooldown = Duration::from_secs(inner.cooldown_secs.max(1));
    let mut ticker = tokio::time::interval(cooldown);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }
        let due: Vec<PathBuf> = {
            let mut pending = inner.pending.lock();
            let now = Instant::now();
            let due: Vec<PathBuf> = pending
                .iter()
                .filter(|(_, last)| now.duration_since(**last) >= cooldown)
                .map(|(path, _)| path.clone())
                .collect();
            for path in &due {
                pending.remove(path);
            }
            due
        };
        for path in due {
            if let Err(e) = inner.upsert_abs(&path).await {
                warn!(path = %path.display(), error = %e, "debounced upsert failed");
            }
        }
    }
    // final drain so a clean shutdown loses nothing that already settled
    let remaining: Vec<PathBuf> = inner.pending.lock().drain().map(|(p, _)| p).collect();
    for path in remaining {
        if let Err(e) = inner.upsert_abs(&path).await {
            warn!(path = %path.display(), error = %e, "shutdown upsert failed");
        }
    }
}
