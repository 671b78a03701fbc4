// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project file reader: ordinary docs are parsed, drawings only register a
//! download link, spreadsheets go sheet by sheet.

use super::args::str_arg;
use crate::env::ToolEnv;
use crate::host::Tool;
use crate::parse;
use crate::response::ToolResponse;
use async_trait::async_trait;
use dd_core::DocType;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

pub const CATEGORY_ORDINARY: &str = "普通文档";
pub const CATEGORY_DRAWING: &str = "图纸图形文档";
pub const CATEGORY_SPREADSHEET: &str = "概算书文档";

pub struct ReadProjectFile;

#[async_trait]
impl Tool for ReadProjectFile {
    fn schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": "read_project_file",
                "description": "读取项目文件内容（设计报告、图纸、清册、概算等），并生成下载链接。",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "relative_file_path": {
                            "type": "string",
                            "description": "文件相对路径，通常来自 query_project_files 的结果"
                        },
                        "file_category": {
                            "type": "string",
                            "enum": [CATEGORY_ORDINARY, CATEGORY_DRAWING, CATEGORY_SPREADSHEET],
                            "description": "文件类别"
                        },
                        "sheet_name": {
                            "type": "string",
                            "description": "概算书文档的表名；缺省时返回可选表名列表"
                        }
                    },
                    "required": ["relative_file_path", "file_category"]
                }
            }
        })
    }

    async fn invoke(&self, env: &ToolEnv, user: &str, args: Value) -> String {
        let Some(rel_path) = str_arg(&args, "relative_file_path") else {
            return ToolResponse::new("错误: 缺少 relative_file_path 参数。", "请提供文件路径后重试。")
                .to_json();
        };
        let Some(category) = str_arg(&args, "file_category") else {
            return ToolResponse::new("错误: 缺少 file_category 参数。", "请提供文件类别后重试。")
                .to_json();
        };
        let sheet_name = str_arg(&args, "sheet_name").unwrap_or_default().to_string();
        info!(%user, path = %rel_path, %category, "read_project_file");

        let abs = env.index.absolute(DocType::Project, rel_path);
        if !abs.exists() {
            return ToolResponse::new(
                format!("错误: 文件路径 {rel_path} 不存在。"),
                "请检查文件路径是否正确。",
            )
            .to_json();
        }

        let (mut response, success) = match category {
            CATEGORY_SPREADSHEET => read_spreadsheet(abs, rel_path, &sheet_name).await,
            CATEGORY_DRAWING => (
                ToolResponse::new("", "本文件为图纸图形文档，暂不支持你读取。"),
                true,
            ),
            _ => read_ordinary(env, abs, rel_path).await,
        };

        if success {
            match env.register_opened_file(user, rel_path, DocType::Project) {
                Some((token, download_url)) => {
                    response = response.with_download(token, download_url, rel_path.to_string());
                    response.hint.push_str("已生成下载链接，以http或者markdown格式向用户提供下载链接。");
                }
                None => {
                    warn!(%user, path = %rel_path, "session registration failed");
                    response.hint = "服务器内部错误：无法为文件注册会话。".to_string();
                }
            }
        }
        response.to_json()
    }
}

async fn read_spreadsheet(abs: PathBuf, rel_path: &str, sheet_name: &str) -> (ToolResponse, bool) {
    let abs_for_names = abs.clone();
    let names = tokio::task::spawn_blocking(move || parse::xlsx_sheet_names(&abs_for_names))
        .await
        .unwrap_or_else(|e| Err(parse::ParseError::Malformed {
            path: abs.display().to_string(),
            message: e.to_string(),
        }));
    let names = match names {
        Ok(names) => names,
        Err(_) => Vec::new(),
    };

    if sheet_name.is_empty() {
        return if names.is_empty() {
            (
                ToolResponse::new(
                    format!("读取文件 {rel_path} 失败: 文件不包含任何工作表，或无法读取。"),
                    "请检查文件是否为有效的Excel文件。",
                ),
                false,
            )
        } else {
            (
                ToolResponse::new(
                    format!("未指定表名，文件 {rel_path} 的sheets如下：\n{}", names.join("\n")),
                    "请指定表名重试。",
                ),
                false,
            )
        };
    }

    if !names.iter().any(|n| n == sheet_name) {
        let available = if names.is_empty() { "无可用Sheet".to_string() } else { names.join("\n") };
        return (
            ToolResponse::new(
                format!("文件 {rel_path} 的sheet'{sheet_name}'未找到， 可用Sheets: {available}。"),
                "请检查sheet_name或从可用列表中选择一个重试。",
            ),
            false,
        );
    }

    let sheet = sheet_name.to_string();
    let lines = tokio::task::spawn_blocking(move || parse::xlsx_sheet_lines(&abs, &sheet, "\t"))
        .await
        .ok()
        .and_then(Result::ok)
        .unwrap_or_default();
    if lines.is_empty() {
        (
            ToolResponse::new(
                format!("无法从文件 '{rel_path}' 的 Sheet '{sheet_name}' 解析内容，或该Sheet为空。"),
                "请检查文件内容和格式。",
            ),
            false,
        )
    } else {
        (
            ToolResponse::new(lines.join("\n"), "已成功读取Sheet内容。内容较多，无需罗列。"),
            true,
        )
    }
}

async fn read_ordinary(env: &ToolEnv, abs: PathBuf, rel_path: &str) -> (ToolResponse, bool) {
    let result = tokio::task::spawn_blocking(move || parse::read_by_extension(&abs)).await;
    match result {
        Ok(Ok(content)) => {
            let content =
                parse::truncate_for_model(content, env.config.llm.model_context_window);
            (
                ToolResponse::new(content, "已成功读取文件内容。内容较多，无需罗列。"),
                true,
            )
        }
        Ok(Err(e)) => (
            ToolResponse::new(
                format!("读取文件 {rel_path} 失败: 错误: {e}"),
                "请检查文件是否存在或格式是否正确。",
            ),
            false,
        ),
        Err(e) => (
            ToolResponse::new(
                format!("读取文件 {rel_path} 失败: 任务错误: {e}"),
                "请联系管理员检查服务器日志。",
            ),
            false,
        ),
    }
}
