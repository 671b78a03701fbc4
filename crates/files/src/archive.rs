// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive extraction and backup. Synchronous; callers run this on the
//! blocking pool.

use crate::FileServiceError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// Sibling directory an archive extracts into: the archive path minus its
/// (possibly double, `.tar.gz`) extension.
pub(crate) fn extraction_dir(archive_path: &Path) -> Result<PathBuf, FileServiceError> {
    let name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FileServiceError::UnsupportedArchive {
            name: archive_path.display().to_string(),
        })?;
    let stem = if let Some(s) = name.strip_suffix(".tar.gz") {
        s
    } else if let Some(s) = name.strip_suffix(".tgz") {
        s
    } else if let Some(s) = name.strip_suffix(".tar") {
        s
    } else if let Some(s) = name.strip_suffix(".zip") {
        s
    } else {
        return Err(FileServiceError::UnsupportedArchive { name: name.to_string() });
    };
    Ok(archive_path.with_file_name(stem))
}

pub(crate) fn extract(archive_path: &Path, dest: &Path) -> Result<(), FileServiceError> {
    let name = archive_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.ends_with(".zip") {
        extract_zip(archive_path, dest)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let file = File::open(archive_path)?;
        let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
        extract_tar(decoder, dest)
    } else if name.ends_with(".tar") {
        let file = File::open(archive_path)?;
        extract_tar(BufReader::new(file), dest)
    } else {
        Err(FileServiceError::UnsupportedArchive { name: name.to_string() })
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), FileServiceError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| FileServiceError::Io(std::io::Error::other(e)))?;
    for i in 0..archive.len() {
        let mut entry =
            archive.by_index(i).map_err(|e| FileServiceError::Io(std::io::Error::other(e)))?;
        // enclosed_name rejects entries that would land outside dest
        let Some(rel) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&out_path)?);
        std::io::copy(&mut entry, &mut out)?;
        out.flush()?;
    }
    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<(), FileServiceError> {
    let mut archive = tar::Archive::new(reader);
    // unpack() skips entries that would escape dest
    archive.unpack(dest)?;
    Ok(())
}

/// Zip `source` into `dest_dir/backup-<name>-<timestamp>.zip`.
pub(crate) fn backup_zip(source: &Path, dest_dir: &Path) -> Result<PathBuf, FileServiceError> {
    let name = source.file_name().and_then(|n| n.to_str()).unwrap_or("dir");
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let archive_path = dest_dir.join(format!("backup-{name}-{timestamp}.zip"));

    let file = File::create(&archive_path)?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default();

    let mut stack = vec![source.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let rel = path.strip_prefix(source).unwrap_or(&path);
            let rel_name = rel.to_string_lossy().replace('\\', "/");
            if entry.file_type()?.is_dir() {
                writer
                    .add_directory(format!("{rel_name}/"), options)
                    .map_err(|e| FileServiceError::Io(std::io::Error::other(e)))?;
                stack.push(path);
            } else {
                writer
                    .start_file(rel_name, options)
                    .map_err(|e| FileServiceError::Io(std::io::Error::other(e)))?;
                let mut input = BufReader::new(File::open(&path)?);
                std::io::copy(&mut input, &mut writer)?;
            }
        }
    }
    writer.finish().map_err(|e| FileServiceError::Io(std::io::Error::other(e)))?;
    Ok(archive_path)
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
