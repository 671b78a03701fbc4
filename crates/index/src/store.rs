// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed index store.
//!
//! One table keyed by `(doc_type, rel_path)`; metadata lives both as
//! denormalized columns (for indexed lookups) and as a tagged JSON blob
//! (for compatibility with textual search). Writers serialize on an
//! internal mutex; readers only borrow a pooled connection.

use dd_core::{DocType, IndexedFile, Metadata};
use parking_lot::Mutex;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("store pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// Typed query over the index. `None` fields are unconstrained; string
/// values containing `%` match with SQL `LIKE`, everything else exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub doc_type: Option<DocType>,
    pub rel_path: Option<String>,
    pub file_name: Option<String>,
    pub ext: Option<String>,
    pub content_hash: Option<String>,
    pub year: Option<String>,
    pub project_name: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub doc_name: Option<String>,
}

impl Query {
    pub fn is_empty(&self) -> bool {
        self.doc_type.is_none()
            && self.rel_path.is_none()
            && self.file_name.is_none()
            && self.ext.is_none()
            && self.content_hash.is_none()
            && self.year.is_none()
            && self.project_name.is_none()
            && self.status.is_none()
            && self.category.is_none()
            && self.sub_category.is_none()
            && self.doc_name.is_none()
    }

    /// WHERE clause + parameters. `=` vs `LIKE` is picked per value.
    fn build(&self) -> (String, Vec<String>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();
        let mut push = |column: &str, value: &str| {
            let op = if value.contains('%') { "LIKE" } else { "=" };
            clauses.push(format!("{column} {op} ?"));
            params.push(value.to_string());
        };
        if let Some(doc_type) = self.doc_type {
            push("doc_type", doc_type.as_str());
        }
        for (column, value) in [
            ("rel_path", &self.rel_path),
            ("file_name", &self.file_name),
            ("ext", &self.ext),
            ("content_hash", &self.content_hash),
            ("year", &self.year),
            ("project_name", &self.project_name),
            ("status", &self.status),
            ("category", &self.category),
            ("sub_category", &self.sub_category),
            ("doc_name", &self.doc_name),
        ] {
            if let Some(value) = value {
                push(column, value);
            }
        }
        (clauses.join(" AND "), params)
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS indexed_files (
    doc_type      TEXT NOT NULL,
    rel_path      TEXT NOT NULL,
    file_name     TEXT NOT NULL,
    ext           TEXT NOT NULL,
    size          INTEGER NOT NULL,
    modified_time INTEGER NOT NULL,
    content_hash  TEXT NOT NULL,
    last_scanned  INTEGER NOT NULL,
    year          TEXT,
    project_name  TEXT,
    status        TEXT,
    category      TEXT,
    sub_category  TEXT,
    doc_name      TEXT,
    metadata      TEXT NOT NULL,
    PRIMARY KEY (doc_type, rel_path)
);
CREATE INDEX IF NOT EXISTS idx_files_project ON indexed_files(project_name, year);
CREATE INDEX IF NOT EXISTS idx_files_category ON indexed_files(category);
CREATE INDEX IF NOT EXISTS idx_files_name ON indexed_files(file_name);
";

/// Pooled SQLite store. Clone-cheap via the pool; `write_mu` totally orders
/// upserts and deletes.
pub struct IndexStore {
    pool: r2d2::Pool<SqliteConnectionManager>,
    write_mu: Mutex<()>,
}

impl IndexStore {
    /// Open (or create) the store. `":memory:"` keeps the index in RAM for
    /// a scan-on-every-boot deployment.
    pub fn open(path: &str) -> Result<Self, IndexError> {
        let manager = if path == ":memory:" {
            SqliteConnectionManager::memory()
        } else {
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectionManager::file(path)
        };
        // a memory store must keep its single connection alive forever, or
        // the database vanishes with it
        let max_size = if path == ":memory:" { 1 } else { 4 };
        let pool = r2d2::Pool::builder()
            .max_size(max_size)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)?;
        pool.get()?.execute_batch(SCHEMA)?;
        Ok(Self { pool, write_mu: Mutex::new(()) })
    }

    /// Insert or replace the row for `(doc_type, rel_path)`.
    pub fn upsert(&self, row: &IndexedFile) -> Result<(), IndexError> {
        let meta_json = serde_json::to_string(&row.metadata)
            .map_err(|e| IndexError::Io(std::io::Error::other(e)))?;
        let _guard = self.write_mu.lock();
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO indexed_files (
                doc_type, rel_path, file_name, ext, size, modified_time,
                content_hash, last_scanned, year, project_name, status,
                category, sub_category, doc_name, metadata
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)
            ON CONFLICT(doc_type, rel_path) DO UPDATE SET
                file_name=excluded.file_name, ext=excluded.ext,
                size=excluded.size, modified_time=excluded.modified_time,
                content_hash=excluded.content_hash,
                last_scanned=excluded.last_scanned, year=excluded.year,
                project_name=excluded.project_name, status=excluded.status,
                category=excluded.category, sub_category=excluded.sub_category,
                doc_name=excluded.doc_name, metadata=excluded.metadata",
            params![
                row.doc_type.as_str(),
                row.rel_path,
                row.file_name,
                row.ext,
                row.size as i64,
                row.modified_time,
                row.content_hash,
                row.last_scanned,
                row.metadata.year(),
                row.metadata.project_name(),
                row.metadata.status(),
                row.metadata.category(),
                row.metadata.sub_category(),
                row.metadata.doc_name(),
                meta_json,
            ],
        )?;
        Ok(())
    }

    /// Remove one row.
    pub fn delete(&self, doc_type: DocType, rel_path: &str) -> Result<usize, IndexError> {
        let _guard = self.write_mu.lock();
        let conn = self.pool.get()?;
        let n = conn.execute(
            "DELETE FROM indexed_files WHERE doc_type = ?1 AND rel_path = ?2",
            params![doc_type.as_str(), rel_path],
        )?;
        Ok(n)
    }

    /// Remove a directory: the exact path plus everything under it.
    pub fn delete_prefix(&self, doc_type: DocType, rel_path: &str) -> Result<usize, IndexError> {
        let prefix = format!("{}/%", rel_path.trim_end_matches('/'));
        let _guard = self.write_mu.lock();
        let conn = self.pool.get()?;
        let n = conn.execute(
            "DELETE FROM indexed_files
             WHERE doc_type = ?1 AND (rel_path = ?2 OR rel_path LIKE ?3)",
            params![doc_type.as_str(), rel_path, prefix],
        )?;
        debug!(doc_type = %doc_type, path = %rel_path, rows = n, "deleted by prefix");
        Ok(n)
    }

    /// Structured lookup. An unconstrained query returns nothing rather than
    /// dumping the whole table.
    pub fn find(&self, query: &Query) -> Result<Vec<IndexedFile>, IndexError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let (where_clause, params) = query.build();
        let sql = format!(
            "SELECT doc_type, rel_path, file_name, ext, size, modified_time,
                    content_hash, last_scanned, metadata
             FROM indexed_files WHERE {where_clause} ORDER BY rel_path"
        );
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), row_to_file)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Distinct project names, optionally scoped to a year.
    pub fn distinct_project_names(&self, year: Option<&str>) -> Result<Vec<String>, IndexError> {
        let conn = self.pool.get()?;
        let mut out = Vec::new();
        match year {
            Some(year) => {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT project_name FROM indexed_files
                     WHERE doc_type = 'project' AND project_name IS NOT NULL AND year = ?1
                     ORDER BY project_name",
                )?;
                let rows = stmt.query_map(params![year], |r| r.get::<_, String>(0))?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT project_name FROM indexed_files
                     WHERE doc_type = 'project' AND project_name IS NOT NULL
                     ORDER BY project_name",
                )?;
                let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    /// doc_name → rel_path for one spec category.
    pub fn specs_by_category(&self, category: &str) -> Result<BTreeMap<String, String>, IndexError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT doc_name, rel_path FROM indexed_files
             WHERE doc_type = 'spec' AND category = ?1 AND doc_name IS NOT NULL",
        )?;
        let rows =
            stmt.query_map(params![category], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
        let mut out = BTreeMap::new();
        for row in rows {
            let (doc_name, rel_path) = row?;
            out.insert(doc_name, rel_path);
        }
        Ok(out)
    }

    /// Row count, for diagnostics.
    pub fn len(&self) -> Result<u64, IndexError> {
        let conn = self.pool.get()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM indexed_files", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<IndexedFile> {
    let doc_type_str: String = row.get(0)?;
    let meta_json: String = row.get(8)?;
    Ok(IndexedFile {
        doc_type: DocType::from_str(&doc_type_str).unwrap_or(DocType::Project),
        rel_path: row.get(1)?,
        file_name: row.get(2)?,
        ext: row.get(3)?,
        size: row.get::<_, i64>(4)? as u64,
        modified_time: row.get(5)?,
        content_hash: row.get(6)?,
        last_scanned: row.get(7)?,
        metadata: serde_json::from_str::<Metadata>(&meta_json).unwrap_or_default(),
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
