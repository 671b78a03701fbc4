// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document text extraction: PDF, DOCX, XLSX and the plain-text families.
//!
//! Everything here is synchronous and CPU/IO heavy; tools call through
//! `spawn_blocking`. Failures return `ParseError` rather than panicking —
//! corrupt uploads are normal traffic, not bugs.

use calamine::{open_workbook_auto, Data, Reader};
use quick_xml::events::Event;
use std::io::Read;
use std::path::Path;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("failed to parse {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn malformed(path: &Path, message: impl std::fmt::Display) -> ParseError {
    ParseError::Malformed { path: path.display().to_string(), message: message.to_string() }
}

/// Sheet names of a workbook, in file order.
pub fn xlsx_sheet_names(path: &Path) -> Result<Vec<String>, ParseError> {
    let workbook = open_workbook_auto(path).map_err(|e| malformed(path, e))?;
    Ok(workbook.sheet_names().to_vec())
}

/// One sheet's rows, each row's cells joined with `delimiter`. Empty cells
/// become empty strings so column positions survive the flattening.
pub fn xlsx_sheet_lines(
    path: &Path,
    sheet_name: &str,
    delimiter: &str,
) -> Result<Vec<String>, ParseError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| malformed(path, e))?;
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| malformed(path, format!("sheet '{sheet_name}': {e}")))?;
    let lines = range
        .rows()
        .map(|row| {
            row.iter()
                .map(cell_to_string)
                .collect::<Vec<String>>()
                .join(delimiter)
        })
        .collect();
    Ok(lines)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                format!("{f}")
            }
        }
        Data::Int(i) => format!("{i}"),
        Data::Bool(b) => format!("{b}"),
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
    }
}

/// Whole-workbook text: every sheet, rows tab-joined, prefixed with the
/// sheet name.
pub fn xlsx_text(path: &Path) -> Result<String, ParseError> {
    let names = xlsx_sheet_names(path)?;
    let mut out = String::new();
    for name in names {
        out.push_str(&format!("[Sheet: {name}]\n"));
        match xlsx_sheet_lines(path, &name, "\t") {
            Ok(lines) => {
                out.push_str(&lines.join("\n"));
                out.push('\n');
            }
            Err(e) => warn!(sheet = %name, error = %e, "sheet parse failed, skipping"),
        }
    }
    Ok(out)
}

/// Text of a PDF.
pub fn pdf_text(path: &Path) -> Result<String, ParseError> {
    if !path.is_file() {
        return Err(ParseError::NotFound(path.display().to_string()));
    }
    pdf_extract::extract_text(path).map_err(|e| malformed(path, e))
}

/// Paragraph text of a DOCX: unzip, stream `word/document.xml`, join runs,
/// newline per paragraph.
pub fn docx_text(path: &Path) -> Result<String, ParseError> {
    let file = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ParseError::NotFound(path.display().to_string())
        } else {
            ParseError::Io(e)
        }
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| malformed(path, e))?;
    let mut document = archive.by_name("word/document.xml").map_err(|e| malformed(path, e))?;
    let mut xml = String::new();
    document.read_to_string(&mut xml)?;
    Ok(docx_xml_to_text(&xml))
}

/// Extract paragraph text from WordprocessingML.
pub(crate) fn docx_xml_to_text(xml: &str) -> String {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                if let Ok(text) = t.unescape() {
                    out.push_str(&text);
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"w:br" => out.push('\n'),
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    out
}

/// Plain-text families, read lossily so a stray GBK byte does not kill the
/// whole read.
pub fn text_file(path: &Path) -> Result<String, ParseError> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ParseError::NotFound(path.display().to_string())
        } else {
            ParseError::Io(e)
        }
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Dispatch by extension, covering every "ordinary document" the read tool
/// accepts.
pub fn read_by_extension(path: &Path) -> Result<String, ParseError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => pdf_text(path),
        "docx" => docx_text(path),
        "xlsx" | "xls" => xlsx_text(path),
        "txt" | "md" | "csv" | "log" | "json" => text_file(path),
        other => Err(ParseError::Unsupported(other.to_string())),
    }
}

/// Clamp tool output to the model's context budget, replacing oversized
/// content with a pointer to the download link.
pub fn truncate_for_model(content: String, limit: usize) -> String {
    if content.chars().count() > limit {
        format!("文件内容过长(超过{limit}字符)，已截断，请提示用户下载查看完整内容。")
    } else {
        content
    }
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
