// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data model for the document index.
//!
//! The index serves three rooted trees (projects, specifications,
//! management documents). A file's identity is `(DocType, rel_path)`;
//! its typed metadata is derived from path components, never contents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Valid review statuses for a project directory (path component three).
pub const PROJECT_STATUSES: [&str; 3] = ["送审", "收口", "过程记录"];

/// Status whose subtree carries category/sub-category components.
pub const STATUS_RECORDS: &str = "过程记录";

/// Extensions whose spec entries get a `doc_name` and participate in
/// retrieval. A subset of the indexable spec extensions (images are indexed
/// for preview but never retrieved as documents).
pub const SEARCHABLE_DOC_EXTS: [&str; 6] = ["pdf", "md", "docx", "txt", "ofd", "ceb"];

/// Which rooted tree an indexed file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Project,
    Spec,
    Management,
}

impl DocType {
    pub const ALL: [DocType; 3] = [DocType::Project, DocType::Spec, DocType::Management];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Project => "project",
            DocType::Spec => "spec",
            DocType::Management => "management",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized document type names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document type: {0}")]
pub struct ParseDocTypeError(pub String);

impl FromStr for DocType {
    type Err = ParseDocTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(DocType::Project),
            "spec" => Ok(DocType::Spec),
            "management" => Ok(DocType::Management),
            other => Err(ParseDocTypeError(other.to_string())),
        }
    }
}

/// Typed per-file metadata, variant by tree.
///
/// Serialized as a tagged JSON blob alongside the denormalized columns so
/// textual search and typed lookups stay in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Metadata {
    Project {
        year: String,
        project_name: String,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sub_category: Option<String>,
    },
    Spec {
        category: String,
        /// File stem; recorded only for searchable document extensions.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        doc_name: Option<String>,
    },
    Management {
        category: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sub_category: Option<String>,
    },
    #[default]
    Unknown,
}

impl Metadata {
    pub fn year(&self) -> Option<&str> {
        match self {
            Metadata::Project { year, .. } => Some(year),
            _ => None,
        }
    }

    pub fn project_name(&self) -> Option<&str> {
        match self {
            Metadata::Project { project_name, .. } => Some(project_name),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            Metadata::Project { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            Metadata::Project { category, .. } => category.as_deref(),
            Metadata::Spec { category, .. } => Some(category),
            Metadata::Management { category, .. } => Some(category),
            Metadata::Unknown => None,
        }
    }

    pub fn sub_category(&self) -> Option<&str> {
        match self {
            Metadata::Project { sub_category, .. } => sub_category.as_deref(),
            Metadata::Management { sub_category, .. } => sub_category.as_deref(),
            _ => None,
        }
    }

    pub fn doc_name(&self) -> Option<&str> {
        match self {
            Metadata::Spec { doc_name, .. } => doc_name.as_deref(),
            _ => None,
        }
    }
}

/// One row in the index store, keyed by `(doc_type, rel_path)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub doc_type: DocType,
    /// Path relative to the tree root, `/`-separated.
    pub rel_path: String,
    pub file_name: String,
    /// Lowercased extension without the dot; empty when absent.
    pub ext: String,
    pub size: u64,
    /// Seconds since epoch.
    pub modified_time: i64,
    /// MD5 of the file contents, lowercase hex.
    pub content_hash: String,
    pub last_scanned: i64,
    pub metadata: Metadata,
}

impl IndexedFile {
    /// Absolute path of this row under the given roots.
    pub fn absolute_path(&self, roots: &DocumentRoots) -> PathBuf {
        roots.root_for(self.doc_type).join(&self.rel_path)
    }
}

/// The three configured tree roots.
#[derive(Debug, Clone)]
pub struct DocumentRoots {
    pub projects: PathBuf,
    pub specs: PathBuf,
    pub management: PathBuf,
}

impl DocumentRoots {
    pub fn root_for(&self, doc_type: DocType) -> &Path {
        match doc_type {
            DocType::Project => &self.projects,
            DocType::Spec => &self.specs,
            DocType::Management => &self.management,
        }
    }

    pub fn absolute(&self, doc_type: DocType, rel_path: &str) -> PathBuf {
        self.root_for(doc_type).join(rel_path)
    }

    /// Classify an absolute path: which root contains it, and the relative
    /// remainder. Returns `None` for paths outside every root.
    pub fn classify(&self, abs: &Path) -> Option<(DocType, PathBuf)> {
        for doc_type in DocType::ALL {
            if let Ok(rel) = abs.strip_prefix(self.root_for(doc_type)) {
                return Some((doc_type, rel.to_path_buf()));
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
