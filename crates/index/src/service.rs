// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The index service: full scans, live watch, structured queries.

use crate::meta::{build_row, is_ignored};
use crate::store::{IndexError, IndexStore, Query};
use crate::watcher::{PendingMap, WatchSet};
use dd_core::{DocType, DocumentRoots, IndexedFile};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state between the service handle, the watcher callbacks and the
/// debounce loop.
pub(crate) struct IndexInner {
    pub(crate) roots: DocumentRoots,
    pub(crate) store: IndexStore,
    pub(crate) pending: PendingMap,
    pub(crate) cooldown_secs: u64,
    spec_allowed_exts: Vec<String>,
}

impl IndexInner {
    /// Upsert one absolute path. Returns false when the path was filtered
    /// (not a regular file, ignored name, non-indexable spec extension).
    pub(crate) async fn upsert_abs(self: &Arc<Self>, abs: &Path) -> Result<bool, IndexError> {
        let Some((doc_type, rel)) = self.roots.classify(abs) else {
            return Ok(false);
        };
        if is_ignored(&rel) {
            return Ok(false);
        }
        let this = Arc::clone(self);
        let abs = abs.to_path_buf();
        tokio::task::spawn_blocking(move || this.upsert_sync(&abs, &rel, doc_type))
            .await
            .map_err(|e| IndexError::Io(std::io::Error::other(e)))?
    }

    fn upsert_sync(
        &self,
        abs: &Path,
        rel: &Path,
        doc_type: DocType,
    ) -> Result<bool, IndexError> {
        match build_row(abs, rel, doc_type, &self.spec_allowed_exts)? {
            Some(row) => {
                self.store.upsert(&row)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Walk one root and upsert every file. Blocking.
    fn scan_root_sync(&self, doc_type: DocType) -> Result<u64, IndexError> {
        let root = self.roots.root_for(doc_type);
        if !root.is_dir() {
            warn!(root = %root.display(), %doc_type, "document root missing, skipping scan");
            return Ok(0);
        }
        let mut count = 0u64;
        // hidden() keeps dotted entries out; git-aware filters stay off —
        // a document corpus is not a git checkout
        let walker = ignore::WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(true)
            .build();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "scan entry error");
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let abs = entry.path();
            let Ok(rel) = abs.strip_prefix(root) else {
                continue;
            };
            if is_ignored(rel) {
                continue;
            }
            match self.upsert_sync(abs, rel, doc_type) {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %abs.display(), error = %e, "scan upsert failed"),
            }
        }
        Ok(count)
    }
}

/// Content-addressed index over the three document roots.
pub struct IndexService {
    inner: Arc<IndexInner>,
    watch: parking_lot::Mutex<Option<WatchSet>>,
}

impl IndexService {
    pub fn new(
        roots: DocumentRoots,
        store_path: &str,
        cooldown_secs: u64,
        spec_allowed_exts: Vec<String>,
    ) -> Result<Self, IndexError> {
        let store = IndexStore::open(store_path)?;
        Ok(Self {
            inner: Arc::new(IndexInner {
                roots,
                store,
                pending: PendingMap::default(),
                cooldown_secs,
                spec_allowed_exts,
            }),
            watch: parking_lot::Mutex::new(None),
        })
    }

    /// Full scan of every root, then live watch + debounce.
    pub async fn start(&self) -> Result<(), IndexError> {
        self.full_scan().await?;
        let watch = WatchSet::start(Arc::clone(&self.inner))?;
        *self.watch.lock() = Some(watch);
        info!("index service started");
        Ok(())
    }

    /// Walk all roots and upsert every file; used at startup and by the
    /// daily rescan job.
    pub async fn full_scan(&self) -> Result<u64, IndexError> {
        let inner = Arc::clone(&self.inner);
        let total = tokio::task::spawn_blocking(move || -> Result<u64, IndexError> {
            let mut total = 0u64;
            for doc_type in DocType::ALL {
                let n = inner.scan_root_sync(doc_type)?;
                info!(%doc_type, files = n, "scanned root");
                total += n;
            }
            Ok(total)
        })
        .await
        .map_err(|e| IndexError::Io(std::io::Error::other(e)))??;
        Ok(total)
    }

    /// Stop watchers and the debounce loop; pending updates are flushed
    /// best-effort.
    pub async fn shutdown(&self) {
        let watch = self.watch.lock().take();
        if let Some(watch) = watch {
            watch.stop().await;
        }
        info!("index service stopped");
    }

    /// Upsert a path that just changed outside the watcher's sight (e.g.
    /// right after an upload, without waiting out the cooldown).
    pub async fn upsert_path(&self, abs: &Path) -> Result<bool, IndexError> {
        self.inner.upsert_abs(abs).await
    }

    /// Structured query.
    pub async fn find_documents(&self, query: Query) -> Result<Vec<IndexedFile>, IndexError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.store.find(&query))
            .await
            .map_err(|e| IndexError::Io(std::io::Error::other(e)))?
    }

    /// doc_name → rel_path for one spec category.
    pub async fn query_specs_by_category(
        &self,
        category: &str,
    ) -> Result<BTreeMap<String, String>, IndexError> {
        let inner = Arc::clone(&self.inner);
        let category = category.to_string();
        tokio::task::spawn_blocking(move || inner.store.specs_by_category(&category))
            .await
            .map_err(|e| IndexError::Io(std::io::Error::other(e)))?
    }

    /// Distinct project names, optionally per year.
    pub async fn project_names(&self, year: Option<String>) -> Result<Vec<String>, IndexError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            inner.store.distinct_project_names(year.as_deref())
        })
        .await
        .map_err(|e| IndexError::Io(std::io::Error::other(e)))?
    }

    pub fn roots(&self) -> &DocumentRoots {
        &self.inner.roots
    }

    /// Absolute path for an indexed row.
    pub fn absolute(&self, doc_type: DocType, rel_path: &str) -> PathBuf {
        self.inner.roots.absolute(doc_type, rel_path)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
