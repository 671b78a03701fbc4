// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-scoped downloads and spec-image serving.

use super::{error_reply, require_user};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use dd_core::DocType;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// `GET /download/{token}/{filename}` — token possession IS the capability;
/// no cookie required.
pub async fn download_by_token(
    State(state): State<AppState>,
    Path((token, filename_in_url)): Path<(String, String)>,
) -> Response {
    let Some(info) = state.sessions.get_downloadable_file_info(&token) else {
        debug!(token = %token, "download token missing or expired");
        return error_reply(StatusCode::NOT_FOUND, "下载链接无效或已过期");
    };
    if filename_in_url != info.file_name {
        warn!(
            requested = %filename_in_url,
            actual = %info.file_name,
            "download filename mismatch, serving resolved name"
        );
    }
    stream_file(&info.abs_path, &info.file_name).await
}

/// `GET /spec_images/{name}` — resolve a spec image by filename through the
/// index, then stream it.
pub async fn spec_image(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Response {
    if let Err(response) = require_user(&state, &jar) {
        return response;
    }
    let rows = match state
        .index
        .find_documents(dd_index::Query {
            doc_type: Some(DocType::Spec),
            file_name: Some(name.clone()),
            ..dd_index::Query::default()
        })
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "spec image lookup failed");
            return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误");
        }
    };
    let Some(row) = rows.first() else {
        return error_reply(StatusCode::NOT_FOUND, format!("图片 {name} 未找到"));
    };
    let abs = state.index.absolute(DocType::Spec, &row.rel_path);
    stream_file(&abs, &row.file_name).await
}

async fn stream_file(abs_path: &std::path::Path, file_name: &str) -> Response {
    let file = match tokio::fs::File::open(abs_path).await {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %abs_path.display(), error = %e, "file open failed");
            return error_reply(StatusCode::NOT_FOUND, "文件不存在");
        }
    };
    info!(path = %abs_path.display(), "streaming file");
    let stream = ReaderStream::new(file);
    let ext = file_name.rsplit('.').next().unwrap_or_default().to_lowercase();
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    );
    (
        [
            (header::CONTENT_TYPE, mime_for_extension(&ext).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// MIME type by extension; everything unknown downloads as a binary blob.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" | "log" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "json" => "application/json",
        "html" | "htm" => "text/html; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
