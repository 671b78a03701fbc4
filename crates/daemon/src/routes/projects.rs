// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project search with the working-directory side effect.

use super::{error_reply, require_user};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use dd_core::DocType;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct ProjectSearchRequest {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub project_year: Option<String>,
}

pub async fn search_get(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(request): Query<ProjectSearchRequest>,
) -> Response {
    search(state, jar, request).await
}

pub async fn search_post(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<ProjectSearchRequest>,
) -> Response {
    search(state, jar, request).await
}

async fn search(state: AppState, jar: CookieJar, request: ProjectSearchRequest) -> Response {
    let user = match require_user(&state, &jar) {
        Ok(user) => user,
        Err(response) => return response,
    };
    if request.project_name.is_empty() {
        return error_reply(StatusCode::BAD_REQUEST, "项目名称不能为空。");
    }

    let rows = match state
        .index
        .find_documents(dd_index::Query {
            doc_type: Some(DocType::Project),
            project_name: Some(format!("%{}%", request.project_name)),
            year: request.project_year.clone(),
            ..dd_index::Query::default()
        })
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "project search failed");
            return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误");
        }
    };

    // collapse file rows into distinct (year, project) pairs
    let mut unique: BTreeMap<(String, String), serde_json::Value> = BTreeMap::new();
    for row in &rows {
        if let (Some(year), Some(name)) = (row.metadata.year(), row.metadata.project_name()) {
            unique.entry((year.to_string(), name.to_string())).or_insert_with(|| {
                serde_json::json!({ "year": year, "project_name": name })
            });
        }
    }
    let projects: Vec<serde_json::Value> = unique.into_values().collect();

    match projects.as_slice() {
        [] => Json(serde_json::json!({ "status": "no_project_found" })).into_response(),
        [single] => {
            let year = single["year"].as_str().unwrap_or_default().to_string();
            let name = single["project_name"].as_str().unwrap_or_default().to_string();
            let files = match state
                .index
                .find_documents(dd_index::Query {
                    doc_type: Some(DocType::Project),
                    project_name: Some(name.clone()),
                    ..dd_index::Query::default()
                })
                .await
            {
                Ok(rows) => rows.into_iter().map(|r| r.rel_path).collect::<Vec<_>>(),
                Err(e) => {
                    warn!(error = %e, "project file listing failed");
                    return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误");
                }
            };
            let dir_path = format!("{year}/{name}");
            info!(user = %user, dir = %dir_path, files = files.len(), "search sets working directory");
            state.sessions.update_opened_dir(&user, &dir_path, files, DocType::Project);
            Json(serde_json::json!({ "status": "single_project", "project": single }))
                .into_response()
        }
        _ => Json(serde_json::json!({ "status": "multiple_projects", "projects": projects }))
            .into_response(),
    }
}
