// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project lookup: exact → substring → embedding fallback, with the match
//! registered as the user's working directory.

use super::args::str_arg;
use crate::env::ToolEnv;
use crate::host::{error_response, Tool};
use async_trait::async_trait;
use dd_core::DocType;
use dd_index::Query;
use serde_json::{json, Value};
use tracing::{info, warn};

const SCORE_THRESHOLD: f32 = 0.8;

pub struct QueryProjectFiles;

#[async_trait]
impl Tool for QueryProjectFiles {
    fn schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": "query_project_files",
                "description": "根据项目名称模糊查询项目文件。project_name为\"/ALL\"时返回所有项目名称；唯一匹配时返回该项目的文件列表并将其设为当前工作项目。",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "project_name": {
                            "type": "string",
                            "description": "项目名称关键字，或 \"/ALL\" 列出全部项目"
                        },
                        "year": {
                            "type": "string",
                            "description": "四位数字年份，可选；缺省检索所有年份"
                        }
                    },
                    "required": ["project_name"]
                }
            }
        })
    }

    async fn invoke(&self, env: &ToolEnv, user: &str, args: Value) -> String {
        let Some(project_name) = str_arg(&args, "project_name") else {
            return error_response("错误: 缺少 project_name 参数。", "请提供项目名称后重试。");
        };
        let year = str_arg(&args, "year").map(str::to_string);
        info!(%user, project = %project_name, year = ?year, "query_project_files");

        let (all_projects, year_of) = match project_names_with_years(env, year.clone()).await {
            Ok(v) => v,
            Err(e) => return error_response(&format!("错误: 查询项目列表失败: {e}"), "请稍后重试。"),
        };

        if project_name == "/ALL" {
            return json!({
                "hint": format!("数据库中{}年份的所有项目如下:", year.as_deref().unwrap_or("")),
                "project_name": all_projects.join("\n"),
            })
            .to_string();
        }

        // exact match first
        if all_projects.iter().any(|p| p == project_name) {
            return resolve_project(env, user, project_name, &year_of).await;
        }

        // substring match
        let matched: Vec<String> =
            all_projects.iter().filter(|p| p.contains(project_name)).cloned().collect();
        if matched.len() == 1 {
            return resolve_project(env, user, &matched[0], &year_of).await;
        }

        // embedding fallback over the narrowed (or full) candidate set
        if env.embeddings.is_available() {
            let candidates = if matched.is_empty() { all_projects.clone() } else { matched };
            if candidates.is_empty() {
                return json!({
                    "hint": format!(
                        "数据库中{}未找到任何项目。",
                        year.as_deref().map(|y| format!("在{y}年份")).unwrap_or_default()
                    ),
                    "project_name": "None",
                })
                .to_string();
            }
            match env.embeddings.rank_by_similarity(project_name, &candidates, 3).await {
                Ok(ranked) if ranked.first().map(|(_, s)| *s > SCORE_THRESHOLD).unwrap_or(false) => {
                    let top = ranked[0].0.clone();
                    info!(project = %top, score = ranked[0].1, "embedding matched project");
                    resolve_project(env, user, &top, &year_of).await
                }
                Ok(ranked) => {
                    let top_names: Vec<String> = ranked.into_iter().map(|(n, _)| n).collect();
                    json!({
                        "hint": "未找到精确匹配的项目，是否是以下几个项目？请以数字方式列表展示给用户并重试。",
                        "project_name": top_names,
                    })
                    .to_string()
                }
                Err(e) => {
                    warn!(error = %e, "embedding ranking failed");
                    error_response(&format!("错误: 向量检索失败: {e}"), "请稍后重试或提供更精确的项目名称。")
                }
            }
        } else if !matched.is_empty() {
            json!({
                "hint": "找到多个可能的项目，且向量检索功能不可用，请提供更精确的项目名称。",
                "project_name": matched,
            })
            .to_string()
        } else {
            json!({
                "hint": "未找到匹配项目，且向量检索功能不可用。",
                "project_name": "None",
            })
            .to_string()
        }
    }
}

/// Distinct project names (optionally for one year) plus each project's year.
async fn project_names_with_years(
    env: &ToolEnv,
    year: Option<String>,
) -> Result<(Vec<String>, std::collections::BTreeMap<String, String>), dd_index::IndexError> {
    let rows = env
        .index
        .find_documents(Query {
            doc_type: Some(DocType::Project),
            year,
            project_name: Some("%".to_string()),
            ..Query::default()
        })
        .await?;
    let mut year_of = std::collections::BTreeMap::new();
    for row in &rows {
        if let (Some(name), Some(year)) = (row.metadata.project_name(), row.metadata.year()) {
            year_of.insert(name.to_string(), year.to_string());
        }
    }
    let names: Vec<String> = year_of.keys().cloned().collect();
    Ok((names, year_of))
}

/// Single-match resolution: list the project's files, register the working
/// directory, answer with the file list.
async fn resolve_project(
    env: &ToolEnv,
    user: &str,
    project_name: &str,
    year_of: &std::collections::BTreeMap<String, String>,
) -> String {
    let rows = match env
        .index
        .find_documents(Query {
            doc_type: Some(DocType::Project),
            project_name: Some(project_name.to_string()),
            ..Query::default()
        })
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            return error_response(&format!("错误: 查询项目文件失败: {e}"), "请稍后重试。")
        }
    };
    let project_files: Vec<String> = rows.into_iter().map(|r| r.rel_path).collect();

    let dir_path = match year_of.get(project_name) {
        Some(year) => format!("{year}/{project_name}"),
        None => project_name.to_string(),
    };
    env.sessions.update_opened_dir(user, &dir_path, project_files.clone(), DocType::Project);

    json!({
        "project_name": project_name,
        "project_files": project_files,
        "hint": "文件较多，若用户无要求，无需罗列",
    })
    .to_string()
}
