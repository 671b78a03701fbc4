// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spec retrieval: embedding-ranked document names within a category, with
//! an optional read of the best match.

use super::args::{bool_arg, str_arg, usize_arg};
use crate::env::ToolEnv;
use crate::host::Tool;
use crate::parse;
use crate::response::{SpecFileHit, SpecFilesResponse};
use async_trait::async_trait;
use dd_core::{DocType, SEARCHABLE_DOC_EXTS};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};

const READ_THRESHOLD: f32 = 0.7;
const DEFAULT_TOP_N: usize = 10;

pub struct OpenSpecificationFiles;

#[async_trait]
impl Tool for OpenSpecificationFiles {
    fn schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": "open_specification_files",
                "description": "按名称检索规程规范文件，返回最相似的规范列表；read_file=true 且高度匹配时直接返回规范内容。query为\"/ALL\"时列出类别下全部规范。",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query_spec_filename": {
                            "type": "string",
                            "description": "要查询的规范文件全名，或 \"/ALL\""
                        },
                        "category": {
                            "type": "string",
                            "description": "规程规范的专业类别，必须是配置的类别之一"
                        },
                        "read_file": {
                            "type": "boolean",
                            "description": "是否读取最匹配文件的内容，默认 false"
                        },
                        "top_n": {
                            "type": "integer",
                            "description": "返回的相似文件数量，默认 10"
                        }
                    },
                    "required": ["query_spec_filename", "category"]
                }
            }
        })
    }

    async fn invoke(&self, env: &ToolEnv, user: &str, args: Value) -> String {
        let Some(query) = str_arg(&args, "query_spec_filename") else {
            return SpecFilesResponse::message(
                "错误: 缺少 query_spec_filename 参数。",
                "请提供规范名称后重试。",
            )
            .to_json();
        };
        let Some(category) = str_arg(&args, "category") else {
            return SpecFilesResponse::message("错误: 缺少 category 参数。", "请提供专业类别后重试。")
                .to_json();
        };
        let read_file = bool_arg(&args, "read_file", false);
        let top_n = usize_arg(&args, "top_n", DEFAULT_TOP_N);
        info!(%user, %query, %category, read_file, top_n, "open_specification_files");

        let spec_dirs = &env.config.index.spec_dirs;
        if !spec_dirs.iter().any(|d| d == category) {
            return SpecFilesResponse::message(
                format!(
                    "错误: 无效的专业类别 '{category}'。有效类别为: {}",
                    spec_dirs.join(", ")
                ),
                "请修正专业类别后重试。",
            )
            .to_json();
        }

        let all_specs = match env.index.query_specs_by_category(category).await {
            Ok(map) => map,
            Err(e) => {
                return SpecFilesResponse::message(
                    format!("数据库操作失败: {e}"),
                    "请联系管理员检查数据库。",
                )
                .to_json()
            }
        };
        if all_specs.is_empty() {
            return SpecFilesResponse::message(
                "",
                format!("在专业类别 '{category}' 下未找到任何规程规范文件。"),
            )
            .to_json();
        }

        if query == "/ALL" {
            let files: Vec<SpecFileHit> = all_specs
                .values()
                .map(|path| SpecFileHit { path: path.clone(), similarity: None })
                .collect();
            let mut response = SpecFilesResponse::message(
                format!("'{category}' 类别下的所有规范列表。"),
                format!("已返回 {} 个规范文件。", files.len()),
            );
            response.files = files;
            return response.to_json();
        }

        // retrieval only looks at document-typed entries
        let searchable: Vec<(String, String)> = all_specs
            .into_iter()
            .filter(|(_, path)| {
                let ext = Path::new(path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_lowercase())
                    .unwrap_or_default();
                SEARCHABLE_DOC_EXTS.contains(&ext.as_str())
            })
            .collect();
        if searchable.is_empty() {
            return SpecFilesResponse::message(
                "",
                format!("在专业类别 '{category}' 下未找到可供检索的文档文件（如PDF, MD, DOCX等）。"),
            )
            .to_json();
        }

        if !env.embeddings.is_available() {
            return SpecFilesResponse::message(
                "错误: 向量检索功能当前不可用。",
                "请联系管理员检查嵌入模型配置。",
            )
            .to_json();
        }

        let names: Vec<String> = searchable.iter().map(|(name, _)| name.clone()).collect();
        let ranked = match env.embeddings.rank_by_similarity(query, &names, top_n).await {
            Ok(ranked) => ranked,
            Err(e) => {
                warn!(error = %e, "spec ranking failed");
                return SpecFilesResponse::message(
                    format!("错误: 向量检索失败: {e}"),
                    "请稍后重试。",
                )
                .to_json();
            }
        };
        if ranked.is_empty() {
            return SpecFilesResponse::message(
                "",
                format!("在专业 '{category}' 中未找到与 '{query}' 相似的规程规范。"),
            )
            .to_json();
        }

        let path_of = |name: &str| -> String {
            searchable
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, p)| p.clone())
                .unwrap_or_default()
        };
        let hits: Vec<SpecFileHit> = ranked
            .iter()
            .map(|(name, score)| SpecFileHit { path: path_of(name), similarity: Some(*score) })
            .collect();

        let top = &hits[0];
        if read_file && top.similarity.unwrap_or(0.0) > READ_THRESHOLD {
            return read_top_match(env, user, top, category).await;
        }

        let (content, hint) = if read_file {
            (
                format!("找到了 {} 个相关文件。", hits.len()),
                "未获取到精确匹配的文件，请用户从以下文件中选择准确的规范名称后，重试".to_string(),
            )
        } else {
            (
                format!("找到了 {} 个与 '{query}' 相关的规程规范。", hits.len()),
                "请用户从以下文件中选择。".to_string(),
            )
        };
        let mut response = SpecFilesResponse::message(content, hint);
        response.files = hits;
        response.to_json()
    }
}

async fn read_top_match(env: &ToolEnv, user: &str, top: &SpecFileHit, category: &str) -> String {
    let abs = env.index.absolute(DocType::Spec, &top.path);
    info!(path = %top.path, %category, similarity = ?top.similarity, "reading top spec match");

    let read = tokio::task::spawn_blocking(move || parse::read_by_extension(&abs)).await;
    let content = match read {
        Ok(Ok(content)) => content,
        Ok(Err(e)) => {
            return SpecFilesResponse::message(format!("错误: {e}"), "读取文件时发生错误。")
                .to_json()
        }
        Err(e) => {
            return SpecFilesResponse::message(
                format!("错误: 读取任务失败: {e}"),
                "请联系管理员检查服务器日志。",
            )
            .to_json()
        }
    };
    let content = parse::truncate_for_model(content, env.config.llm.model_context_window);

    let Some((token, download_url)) = env.register_opened_file(user, &top.path, DocType::Spec)
    else {
        return SpecFilesResponse::message(content, "服务器内部错误：无法为文件注册会话。")
            .to_json();
    };
    SpecFilesResponse {
        content,
        hint: "已成功读取最匹配的文件内容。".to_string(),
        files: Vec::new(),
        token: Some(token),
        download_url: Some(download_url),
        file_path: Some(top.path.clone()),
        similarity: top.similarity,
    }
    .to_json()
}
