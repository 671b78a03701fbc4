// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DOCX template rendering.
//!
//! A template is an ordinary .docx whose `word/document.xml` carries
//! `{{key}}` placeholders. Rendering substitutes the context values, drops
//! paragraphs left without any text, and rewrites the archive. Keys absent
//! from the context render as empty strings.

use regex::Regex;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template archive invalid: {0}")]
    BadArchive(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render `template` with `context` into `output`. Blocking.
pub fn render_docx_template(
    template: &Path,
    output: &Path,
    context: &serde_json::Map<String, Value>,
) -> Result<(), RenderError> {
    if !template.is_file() {
        return Err(RenderError::TemplateNotFound(template.display().to_string()));
    }
    let file = std::fs::File::open(template)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| RenderError::BadArchive(e.to_string()))?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let out_file = std::fs::File::create(output)?;
    let mut writer = zip::ZipWriter::new(out_file);
    let options = SimpleFileOptions::default();

    for i in 0..archive.len() {
        let mut entry =
            archive.by_index(i).map_err(|e| RenderError::BadArchive(e.to_string()))?;
        let name = entry.name().to_string();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;

        if name == "word/document.xml" {
            let xml = String::from_utf8_lossy(&bytes).into_owned();
            let rendered = strip_empty_paragraphs(&substitute(&xml, context));
            bytes = rendered.into_bytes();
        }
        writer
            .start_file(name, options)
            .map_err(|e| RenderError::BadArchive(e.to_string()))?;
        writer.write_all(&bytes)?;
    }
    writer.finish().map_err(|e| RenderError::BadArchive(e.to_string()))?;
    Ok(())
}

/// Replace every `{{ key }}` with the context value; unknown keys become "".
pub(crate) fn substitute(xml: &str, context: &serde_json::Map<String, Value>) -> String {
    // the template author writes {{key}}; Word may not split it across runs
    // as long as the placeholder was typed in one go
    let re = match Regex::new(r"\{\{\s*([A-Za-z0-9_一-鿿]+)\s*\}\}") {
        Ok(re) => re,
        Err(_) => return xml.to_string(),
    };
    re.replace_all(xml, |caps: &regex::Captures<'_>| {
        match context.get(&caps[1]) {
            Some(Value::String(s)) => xml_escape(s),
            Some(Value::Null) | None => String::new(),
            Some(other) => xml_escape(&other.to_string()),
        }
    })
    .into_owned()
}

/// Drop `<w:p>` elements that contain no visible text (placeholder lines
/// whose keys rendered empty leave hollow paragraphs behind).
pub(crate) fn strip_empty_paragraphs(xml: &str) -> String {
    let re = match Regex::new(r"(?s)<w:p\b[^>]*>.*?</w:p>|<w:p\b[^>]*/>") {
        Ok(re) => re,
        Err(_) => return xml.to_string(),
    };
    let text_re = match Regex::new(r"(?s)<w:t[^>]*>([^<]*)</w:t>") {
        Ok(re) => re,
        Err(_) => return xml.to_string(),
    };
    re.replace_all(xml, |caps: &regex::Captures<'_>| {
        let paragraph = &caps[0];
        let has_text = text_re
            .captures_iter(paragraph)
            .any(|t| !t[1].trim().is_empty());
        // keep structural paragraphs (tables cells rely on them) that carry
        // drawings or fields even without plain text
        let has_other_content = paragraph.contains("<w:drawing") || paragraph.contains("<w:tbl");
        if has_text || has_other_content {
            paragraph.to_string()
        } else {
            String::new()
        }
    })
    .into_owned()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
