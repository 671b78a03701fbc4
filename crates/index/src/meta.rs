// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path-derived metadata and row construction.
//!
//! Metadata comes from path components only, never file contents. The
//! component layout per tree:
//!
//! ```text
//! project:    <year>/<project_name>/<status>/[category/[sub_category/]]…
//! spec:       <category>/<doc_name>/…            (doc_name for doc exts only)
//! management: <category>/[sub_category/]…
//! ```

use dd_core::{DocType, IndexedFile, Metadata, SEARCHABLE_DOC_EXTS, STATUS_RECORDS};
use md5::{Digest, Md5};
use std::io::Read;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Lowercased extension without the dot; empty when absent.
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).unwrap_or_default()
}

fn component(parts: &[&str], idx: usize) -> Option<String> {
    parts.get(idx).map(|s| s.to_string())
}

/// Derive the typed metadata for a relative path under the given tree.
pub fn extract_metadata(rel_path: &Path, doc_type: DocType) -> Metadata {
    let parts: Vec<&str> =
        rel_path.components().filter_map(|c| c.as_os_str().to_str()).collect();
    if parts.is_empty() {
        return Metadata::Unknown;
    }

    match doc_type {
        DocType::Project => {
            let status = component(&parts, 2).unwrap_or_default();
            // category layers exist only inside the records subtree
            let (category, sub_category) = if status == STATUS_RECORDS {
                (component(&parts, 3), component(&parts, 4))
            } else {
                (None, None)
            };
            Metadata::Project {
                year: component(&parts, 0).unwrap_or_default(),
                project_name: component(&parts, 1).unwrap_or_default(),
                status,
                category,
                sub_category,
            }
        }
        DocType::Spec => {
            let ext = extension_of(rel_path);
            let doc_name = if SEARCHABLE_DOC_EXTS.contains(&ext.as_str()) {
                component(&parts, 1)
            } else {
                None
            };
            Metadata::Spec { category: component(&parts, 0).unwrap_or_default(), doc_name }
        }
        DocType::Management => Metadata::Management {
            category: component(&parts, 0).unwrap_or_default(),
            sub_category: component(&parts, 1),
        },
    }
}

/// Stat + hash a file and build its index row. Returns `None` when the path
/// is not a regular file or (for the spec tree) its extension is not
/// indexable. Blocking; run on the blocking pool.
pub fn build_row(
    abs_path: &Path,
    rel_path: &Path,
    doc_type: DocType,
    spec_allowed_exts: &[String],
) -> std::io::Result<Option<IndexedFile>> {
    let metadata = match std::fs::metadata(abs_path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if !metadata.is_file() {
        return Ok(None);
    }

    let ext = extension_of(abs_path);
    if doc_type == DocType::Spec && !spec_allowed_exts.iter().any(|e| e == &ext) {
        return Ok(None);
    }

    let modified_time = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let content_hash = md5_file(abs_path)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    Ok(Some(IndexedFile {
        doc_type,
        rel_path: rel_path.to_string_lossy().replace('\\', "/"),
        file_name: abs_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        ext,
        size: metadata.len(),
        modified_time,
        content_hash,
        last_scanned: now,
        metadata: extract_metadata(rel_path, doc_type),
    }))
}

/// Streaming MD5 of a file, lowercase hex.
pub fn md5_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Watcher/scan ignore rule: hidden and temp artifacts never reach the index.
pub(crate) fn is_ignored(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.ends_with(".tmp") {
        return true;
    }
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s.starts_with('.') || s.starts_with('~'))
            .unwrap_or(false)
    })
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
