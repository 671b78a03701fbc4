// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multipart upload flows for the three document trees.
//!
//! Each POST carries text fields plus one or more `files` parts whose
//! client-side filename is a relative sub-path. Pre-existence checks return
//! 409 unless `overwrite` is set; saved paths are re-indexed immediately so
//! the tools see them without waiting for the watcher.

use super::{error_reply, require_user};
use crate::state::AppState;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use dd_core::DocType;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// Parsed multipart payload common to every upload flow.
#[derive(Debug, Default)]
struct UploadPayload {
    fields: HashMap<String, String>,
    files: Vec<(String, Vec<u8>)>,
}

impl UploadPayload {
    async fn read(mut multipart: Multipart) -> Result<Self, Response> {
        let mut payload = Self::default();
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    return Err(error_reply(
                        StatusCode::BAD_REQUEST,
                        format!("上传表单无效: {e}"),
                    ))
                }
            };
            let name = field.name().unwrap_or_default().to_string();
            if name == "files" {
                let sub_path = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    error_reply(StatusCode::BAD_REQUEST, format!("读取上传文件失败: {e}"))
                })?;
                if !sub_path.is_empty() {
                    payload.files.push((sub_path, bytes.to_vec()));
                }
            } else {
                let value = field.text().await.map_err(|e| {
                    error_reply(StatusCode::BAD_REQUEST, format!("读取表单字段失败: {e}"))
                })?;
                payload.fields.insert(name, value);
            }
        }
        Ok(payload)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str).filter(|s| !s.is_empty())
    }

    fn overwrite(&self) -> bool {
        matches!(
            self.fields.get("overwrite").map(String::as_str),
            Some("true") | Some("1") | Some("on")
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ProjectExistsQuery {
    #[serde(default)]
    pub year_query: Option<String>,
    #[serde(default)]
    pub project_name_query: Option<String>,
}

/// `GET /api/upload-project` — form schema, or an existence probe when the
/// query names a project.
pub async fn project_get(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ProjectExistsQuery>,
) -> Response {
    if let Err(response) = require_user(&state, &jar) {
        return response;
    }
    if let (Some(year), Some(name)) = (&query.year_query, &query.project_name_query) {
        let base_dir = format!("{year}/{name}");
        return if state.projects_fs.directory_exists(&base_dir).await {
            (
                StatusCode::CONFLICT,
                Json(serde_json::json!({
                    "status": "exists",
                    "message": format!("项目目录 '{base_dir}' 已存在，如需覆盖请勾选复选框。"),
                })),
            )
                .into_response()
        } else {
            Json(serde_json::json!({
                "status": "not_exists",
                "message": "项目目录不存在，可以创建。",
            }))
            .into_response()
        };
    }
    Json(upload_form_schema(&["year", "project_name"], None)).into_response()
}

/// `POST /api/upload-project` — files land in `<year>/<name>/送审`, with
/// placeholder files seeding the sibling 收口/过程文件 directories.
pub async fn project_post(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let user = match require_user(&state, &jar) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let payload = match UploadPayload::read(multipart).await {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let (Some(year), Some(project_name)) = (payload.text("year"), payload.text("project_name"))
    else {
        return error_reply(
            StatusCode::BAD_REQUEST,
            "POST请求必须包含 'year', 'project_name', 和 'files'。",
        );
    };
    if payload.files.is_empty() {
        return error_reply(StatusCode::BAD_REQUEST, "未收到任何文件。");
    }

    let base_dir = format!("{year}/{project_name}");
    if state.projects_fs.directory_exists(&base_dir).await && !payload.overwrite() {
        return error_reply(
            StatusCode::CONFLICT,
            format!("项目 '{base_dir}' 已存在。请确认是否覆盖。"),
        );
    }

    let review_dir = format!("{base_dir}/送审");
    let count = payload.files.len();
    info!(user = %user, dir = %base_dir, files = count, "project upload");
    if let Err(response) = save_and_index(&state, DocType::Project, payload.files, &review_dir).await
    {
        return response;
    }
    for aux in [format!("{base_dir}/收口"), format!("{base_dir}/过程文件")] {
        if let Err(e) = state.projects_fs.create_placeholder(&aux, None).await {
            warn!(dir = %aux, error = %e, "placeholder creation failed");
        }
    }
    Json(serde_json::json!({
        "message": "项目上传成功。",
        "directory": base_dir,
        "file_count": count,
    }))
    .into_response()
}

/// `GET /api/upload-standards` — the form schema, category choices included.
pub async fn standards_get(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Err(response) = require_user(&state, &jar) {
        return response;
    }
    Json(upload_form_schema(
        &["category", "spec_name"],
        Some(&state.config.index.spec_dirs),
    ))
    .into_response()
}

/// `POST /api/upload-standards` — files land in `<category>/<spec_name>`.
pub async fn standards_post(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let user = match require_user(&state, &jar) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let payload = match UploadPayload::read(multipart).await {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let (Some(category), Some(spec_name)) = (payload.text("category"), payload.text("spec_name"))
    else {
        return error_reply(
            StatusCode::BAD_REQUEST,
            "POST请求必须包含 'category', 'spec_name', 和 'files'。",
        );
    };
    if payload.files.is_empty() {
        return error_reply(StatusCode::BAD_REQUEST, "未收到任何文件。");
    }

    let target_dir = format!("{category}/{spec_name}");
    if state.specs_fs.directory_exists(&target_dir).await && !payload.overwrite() {
        return error_reply(StatusCode::CONFLICT, format!("规程目录 '{target_dir}' 已存在。"));
    }

    let count = payload.files.len();
    info!(user = %user, dir = %target_dir, files = count, "standards upload");
    if let Err(response) = save_and_index(&state, DocType::Spec, payload.files, &target_dir).await {
        return response;
    }
    Json(serde_json::json!({
        "message": "规程上传成功。",
        "directory": target_dir,
        "file_count": count,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct FilesExistsQuery {
    #[serde(default)]
    pub relative_path: Option<String>,
}

/// `GET /api/upload-files` — existence probe for an arbitrary project subdir.
pub async fn files_get(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<FilesExistsQuery>,
) -> Response {
    if let Err(response) = require_user(&state, &jar) {
        return response;
    }
    let Some(relative_path) = query.relative_path else {
        return error_reply(StatusCode::BAD_REQUEST, "GET 请求必须包含 'relative_path' 查询参数。");
    };
    if state.projects_fs.directory_exists(&relative_path).await {
        StatusCode::OK.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// `POST /api/upload-files` — upload into an existing project subtree; the
/// target must sit at least two levels deep (year/project/…).
pub async fn files_post(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let user = match require_user(&state, &jar) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let payload = match UploadPayload::read(multipart).await {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let Some(relative_path) = payload.text("relative_path").map(str::to_string) else {
        return error_reply(StatusCode::BAD_REQUEST, "POST 请求必须包含 'relative_path' 和 'files'。");
    };
    if payload.files.is_empty() {
        return error_reply(StatusCode::BAD_REQUEST, "未收到任何文件。");
    }
    let parts: Vec<&str> = relative_path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() < 3 {
        return error_reply(
            StatusCode::BAD_REQUEST,
            "路径无效：上传目录必须至少在项目文件夹下两层（例如，年/项目名/子目录）。",
        );
    }

    if state.projects_fs.directory_exists(&relative_path).await && !payload.overwrite() {
        return error_reply(
            StatusCode::CONFLICT,
            format!("目标目录 '{relative_path}' 已存在。请确认是否覆盖。"),
        );
    }

    let count = payload.files.len();
    info!(user = %user, dir = %relative_path, files = count, "files upload");
    if let Err(response) =
        save_and_index(&state, DocType::Project, payload.files, &relative_path).await
    {
        return response;
    }

    // refresh the uploader's working directory once the index settles
    let year = parts[0].to_string();
    let project_name = parts[1].to_string();
    let refresh_state = state.clone();
    let refresh_user = user.clone();
    let cooldown = state.config.index.watcher_cooldown_secs;
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(cooldown * 2 + 1)).await;
        refresh_working_directory(&refresh_state, &refresh_user, &year, &project_name).await;
    });

    Json(serde_json::json!({
        "message": "文件上传成功。",
        "directory": relative_path,
        "file_count": count,
    }))
    .into_response()
}

/// Write the batch through the rooted service, then upsert each saved path.
async fn save_and_index(
    state: &AppState,
    doc_type: DocType,
    files: Vec<(String, Vec<u8>)>,
    dest_dir: &str,
) -> Result<(), Response> {
    let fs = state.fs_for(doc_type);
    let sub_paths: Vec<String> = files.iter().map(|(p, _)| p.clone()).collect();
    match fs.save_directory_upload(files, dest_dir).await {
        Ok(_) => {
            for sub_path in sub_paths {
                let abs = fs.root().join(dest_dir).join(&sub_path);
                if let Err(e) = state.index.upsert_path(&abs).await {
                    warn!(path = %abs.display(), error = %e, "post-upload index upsert failed");
                }
            }
            Ok(())
        }
        Err(dd_files::FileServiceError::PathEscape { path }) => Err(error_reply(
            StatusCode::BAD_REQUEST,
            format!("无效的路径: {path}"),
        )),
        Err(e) => {
            warn!(dir = %dest_dir, error = %e, "upload save failed");
            Err(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("服务器内部错误: {e}"),
            ))
        }
    }
}

/// Re-run the single-project search so the uploader's working directory and
/// tokens cover the new files.
async fn refresh_working_directory(state: &AppState, user: &str, year: &str, project_name: &str) {
    let files = match state
        .index
        .find_documents(dd_index::Query {
            doc_type: Some(DocType::Project),
            project_name: Some(project_name.to_string()),
            ..dd_index::Query::default()
        })
        .await
    {
        Ok(rows) => rows.into_iter().map(|r| r.rel_path).collect::<Vec<_>>(),
        Err(e) => {
            warn!(error = %e, "post-upload working directory refresh failed");
            return;
        }
    };
    let dir_path = format!("{year}/{project_name}");
    info!(user = %user, dir = %dir_path, files = files.len(), "working directory refreshed after upload");
    state.sessions.update_opened_dir(user, &dir_path, files, DocType::Project);
}

/// Minimal JSON-schema for the upload forms, mirroring the legacy UI
/// contract.
fn upload_form_schema(required: &[&str], categories: Option<&[String]>) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    for field in required {
        properties.insert(
            field.to_string(),
            serde_json::json!({ "type": "string", "title": field }),
        );
    }
    properties.insert(
        "overwrite".to_string(),
        serde_json::json!({ "type": "boolean", "title": "overwrite", "default": false }),
    );
    properties.insert(
        "files".to_string(),
        serde_json::json!({ "type": "array", "title": "files", "items": { "type": "string", "format": "binary" } }),
    );
    if let (Some(categories), Some(entry)) = (categories, properties.get_mut("category")) {
        entry["enum"] = serde_json::json!(categories);
        if let Some(first) = categories.first() {
            entry["default"] = serde_json::json!(first);
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
