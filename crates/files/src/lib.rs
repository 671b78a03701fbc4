// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dd-files: rooted filesystem service.
//!
//! Every operation takes a path relative to the service root and refuses
//! anything that would resolve outside it. Writes are atomic (tempfile in a
//! hidden staging dir, then rename). Blocking I/O runs on the tokio blocking
//! pool so callers never stall the reactor.

mod archive;

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Staging directory name under the root. Leading dot keeps it out of the
/// index watcher's view.
const TEMP_DIR_NAME: &str = ".tmp_uploads";

const PLACEHOLDER_NAME: &str = "placeholder.txt";

/// Errors from rooted filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum FileServiceError {
    #[error("path escapes the service root: {path}")]
    PathEscape { path: String },

    #[error("file not found: {path}")]
    NotFound { path: String },

    #[error("target already exists: {path}")]
    AlreadyExists { path: String },

    #[error("unsupported archive format: {name}")]
    UnsupportedArchive { name: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Disk usage for the filesystem holding the root.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub total_human: String,
    pub used_human: String,
    pub free_human: String,
}

/// Rooted filesystem helper. Cheap to clone; all state is the two paths.
#[derive(Debug, Clone)]
pub struct FileService {
    root: PathBuf,
    temp_dir: PathBuf,
}

impl FileService {
    /// Create a service rooted at `root`, creating the root and its staging
    /// directory if absent.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FileServiceError> {
        let root: PathBuf = root.into();
        std::fs::create_dir_all(&root)?;
        let temp_dir = root.join(TEMP_DIR_NAME);
        std::fs::create_dir_all(&temp_dir)?;
        info!(root = %root.display(), "file service initialized");
        Ok(Self { root, temp_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path against the root, rejecting absolute inputs
    /// and any `..` that would climb out. Purely lexical; the root itself is
    /// the only path touched before validation passes.
    pub fn safe_path(&self, relative: impl AsRef<Path>) -> Result<PathBuf, FileServiceError> {
        let relative = relative.as_ref();
        let escape = || FileServiceError::PathEscape { path: relative.display().to_string() };

        if relative.is_absolute() {
            return Err(escape());
        }
        let mut depth: i32 = 0;
        let mut normalized = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    depth += 1;
                    normalized.push(part);
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(escape());
                    }
                    normalized.pop();
                }
                Component::RootDir | Component::Prefix(_) => return Err(escape()),
            }
        }
        Ok(self.root.join(normalized))
    }

    // --- atomic writes ---

    /// Stream an upload into place. Writes to a staging file, then renames.
    pub async fn save_upload<R>(
        &self,
        mut reader: R,
        relative: &str,
    ) -> Result<PathBuf, FileServiceError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let final_path = self.safe_path(relative)?;
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.staging_path();
        let mut tmp = tokio::fs::File::create(&staging).await?;
        let result: Result<(), std::io::Error> = async {
            tokio::io::copy(&mut reader, &mut tmp).await?;
            tmp.flush().await?;
            Ok(())
        }
        .await;
        drop(tmp);
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        self.promote(&staging, &final_path).await?;
        debug!(path = %final_path.display(), "saved upload");
        Ok(final_path)
    }

    /// Write bytes atomically.
    pub async fn save_bytes(
        &self,
        content: Vec<u8>,
        relative: &str,
    ) -> Result<PathBuf, FileServiceError> {
        let final_path = self.safe_path(relative)?;
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.staging_path();
        if let Err(e) = tokio::fs::write(&staging, &content).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        self.promote(&staging, &final_path).await?;
        debug!(path = %final_path.display(), bytes = content.len(), "saved content");
        Ok(final_path)
    }

    /// Save a batch of uploads under `dest_rel_dir`, each entry carrying its
    /// own sub-path. On any failure the already-written files are unlinked
    /// best-effort and the error surfaces.
    pub async fn save_directory_upload(
        &self,
        files: Vec<(String, Vec<u8>)>,
        dest_rel_dir: &str,
    ) -> Result<PathBuf, FileServiceError> {
        let base = self.safe_path(dest_rel_dir)?;
        tokio::fs::create_dir_all(&base).await?;

        let mut saved: Vec<PathBuf> = Vec::with_capacity(files.len());
        for (sub_path, content) in files {
            if sub_path.is_empty() {
                continue;
            }
            let relative = format!("{dest_rel_dir}/{sub_path}");
            match self.save_bytes(content, &relative).await {
                Ok(path) => saved.push(path),
                Err(e) => {
                    warn!(dir = %dest_rel_dir, error = %e, "directory upload failed, rolling back");
                    for path in saved {
                        if let Err(unlink_err) = tokio::fs::remove_file(&path).await {
                            warn!(path = %path.display(), error = %unlink_err, "rollback unlink failed");
                        }
                    }
                    return Err(e);
                }
            }
        }
        info!(dir = %base.display(), count = saved.len(), "directory upload saved");
        Ok(base)
    }

    // --- reads ---

    /// Chunked async reader for a file.
    pub async fn read_stream(
        &self,
        relative: &str,
    ) -> Result<ReaderStream<tokio::fs::File>, FileServiceError> {
        let path = self.safe_path(relative)?;
        let file = tokio::fs::File::open(&path).await.map_err(|e| self.map_missing(e, relative))?;
        if !file.metadata().await?.is_file() {
            return Err(FileServiceError::NotFound { path: relative.to_string() });
        }
        Ok(ReaderStream::new(file))
    }

    /// Whole-file read.
    pub async fn read_bytes(&self, relative: &str) -> Result<Vec<u8>, FileServiceError> {
        let path = self.safe_path(relative)?;
        tokio::fs::read(&path).await.map_err(|e| self.map_missing(e, relative))
    }

    // --- directories ---

    /// Recursive removal; a missing directory counts as success.
    pub async fn remove_directory(&self, relative: &str) -> Result<(), FileServiceError> {
        let path = self.safe_path(relative)?;
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "removed directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn create_directory(&self, relative: &str) -> Result<PathBuf, FileServiceError> {
        let path = self.safe_path(relative)?;
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// Ensure `relative` exists as a directory and touch an empty placeholder
    /// file in it if absent.
    pub async fn create_placeholder(
        &self,
        relative_dir: &str,
        filename: Option<&str>,
    ) -> Result<PathBuf, FileServiceError> {
        let dir = self.create_directory(relative_dir).await?;
        let placeholder = dir.join(filename.unwrap_or(PLACEHOLDER_NAME));
        if tokio::fs::metadata(&placeholder).await.is_err() {
            tokio::fs::File::create(&placeholder).await?;
            debug!(path = %placeholder.display(), "created placeholder");
        }
        Ok(placeholder)
    }

    // --- probes ---

    pub async fn file_exists(&self, relative: &str) -> bool {
        match self.safe_path(relative) {
            Ok(path) => tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn directory_exists(&self, relative: &str) -> bool {
        match self.safe_path(relative) {
            Ok(path) => tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false),
            Err(_) => false,
        }
    }

    // --- disk ---

    /// Usage of the filesystem holding the root.
    pub async fn disk_usage(&self) -> Result<DiskUsage, FileServiceError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let total = fs2::total_space(&root)?;
            let free = fs2::available_space(&root)?;
            let used = total.saturating_sub(free);
            Ok(DiskUsage {
                total_bytes: total,
                used_bytes: used,
                free_bytes: free,
                total_human: human_gib(total),
                used_human: human_gib(used),
                free_human: human_gib(free),
            })
        })
        .await
        .map_err(|e| FileServiceError::Io(std::io::Error::other(e)))?
    }

    // --- archives (impl in archive.rs) ---

    /// Extract a `.zip` / `.tar` / `.tar.gz` archive into a sibling directory
    /// named after the archive.
    pub async fn decompress_archive(
        &self,
        relative: &str,
        overwrite: bool,
    ) -> Result<PathBuf, FileServiceError> {
        let archive_path = self.safe_path(relative)?;
        if tokio::fs::metadata(&archive_path).await.is_err() {
            return Err(FileServiceError::NotFound { path: relative.to_string() });
        }
        let dest = archive::extraction_dir(&archive_path)?;
        if tokio::fs::metadata(&dest).await.is_ok() {
            if !overwrite {
                return Err(FileServiceError::AlreadyExists {
                    path: dest.display().to_string(),
                });
            }
            tokio::fs::remove_dir_all(&dest).await?;
        }
        tokio::fs::create_dir_all(&dest).await?;
        let dest_clone = dest.clone();
        tokio::task::spawn_blocking(move || archive::extract(&archive_path, &dest_clone))
            .await
            .map_err(|e| FileServiceError::Io(std::io::Error::other(e)))??;
        info!(dest = %dest.display(), "archive extracted");
        Ok(dest)
    }

    /// Zip up a directory into `dest_dir` with a timestamped name; returns
    /// the archive path.
    pub async fn backup_directory(
        &self,
        relative: &str,
        dest_dir: impl Into<PathBuf>,
    ) -> Result<PathBuf, FileServiceError> {
        let source = self.safe_path(relative)?;
        if !source.is_dir() {
            return Err(FileServiceError::NotFound { path: relative.to_string() });
        }
        let dest_dir: PathBuf = dest_dir.into();
        tokio::fs::create_dir_all(&dest_dir).await?;
        let archive_path = tokio::task::spawn_blocking(move || {
            archive::backup_zip(&source, &dest_dir)
        })
        .await
        .map_err(|e| FileServiceError::Io(std::io::Error::other(e)))??;
        info!(archive = %archive_path.display(), "backup created");
        Ok(archive_path)
    }

    // --- internals ---

    fn staging_path(&self) -> PathBuf {
        self.temp_dir.join(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Rename the staging file into place; falls back to copy+remove for
    /// cross-device staging dirs.
    async fn promote(&self, staging: &Path, final_path: &Path) -> Result<(), FileServiceError> {
        match tokio::fs::rename(staging, final_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(18) => {
                // EXDEV
                tokio::fs::copy(staging, final_path).await?;
                tokio::fs::remove_file(staging).await?;
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(staging).await;
                Err(e.into())
            }
        }
    }

    fn map_missing(&self, e: std::io::Error, relative: &str) -> FileServiceError {
        if e.kind() == ErrorKind::NotFound {
            FileServiceError::NotFound { path: relative.to_string() }
        } else {
            FileServiceError::Io(e)
        }
    }
}

fn human_gib(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
