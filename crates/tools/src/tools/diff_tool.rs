// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-file comparison: per-sheet for estimate workbooks, flattened text
//! for reports and material lists.

use super::args::{bool_arg, str_arg};
use crate::diff::unified_diff;
use crate::env::ToolEnv;
use crate::host::Tool;
use crate::parse;
use crate::response::DiffResponse;
use async_trait::async_trait;
use dd_core::DocType;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

pub const TYPE_REPORT: &str = "报告（说明书）";
pub const TYPE_MATERIAL: &str = "材料清册";
pub const TYPE_ESTIMATE: &str = "概算表";

const DIFFABLE_EXTS: [&str; 3] = ["xlsx", "pdf", "docx"];

pub struct DiffProjectFile;

#[async_trait]
impl Tool for DiffProjectFile {
    fn schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": "diff_project_file",
                "description": "比较两个项目文档的差异（设计报告、材料清册、概算表），返回统一差异格式的结果。",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "relative_file1_path": {
                            "type": "string",
                            "description": "文件1（如送审版）的相对路径"
                        },
                        "relative_file2_path": {
                            "type": "string",
                            "description": "文件2（如收口版）的相对路径"
                        },
                        "document_type": {
                            "type": "string",
                            "enum": [TYPE_REPORT, TYPE_MATERIAL, TYPE_ESTIMATE],
                            "description": "文档类型"
                        },
                        "sheet_name": {
                            "type": "string",
                            "description": "概算表单表比较时的表名；all_sheet=true 时忽略"
                        },
                        "all_sheet": {
                            "type": "boolean",
                            "description": "概算表是否比较所有同名sheet，默认 false"
                        }
                    },
                    "required": ["relative_file1_path", "relative_file2_path", "document_type"]
                }
            }
        })
    }

    async fn invoke(&self, env: &ToolEnv, user: &str, args: Value) -> String {
        let (Some(rel1), Some(rel2)) = (
            str_arg(&args, "relative_file1_path"),
            str_arg(&args, "relative_file2_path"),
        ) else {
            return DiffResponse::failure("错误: 需要提供两个文件的相对路径。").to_json();
        };
        let Some(document_type) = str_arg(&args, "document_type") else {
            return DiffResponse::failure("错误: 缺少 document_type 参数。").to_json();
        };
        let sheet_name = str_arg(&args, "sheet_name").map(str::to_string);
        let all_sheet = bool_arg(&args, "all_sheet", false);
        info!(%user, file1 = %rel1, file2 = %rel2, %document_type, ?sheet_name, all_sheet, "diff_project_file");

        if ![TYPE_REPORT, TYPE_MATERIAL, TYPE_ESTIMATE].contains(&document_type) {
            return DiffResponse::failure(format!(
                "错误: 不支持的文件类型 '{document_type}'。支持的类型有 '{TYPE_REPORT}', '{TYPE_MATERIAL}', '{TYPE_ESTIMATE}'。"
            ))
            .to_json();
        }

        let abs1 = env.index.absolute(DocType::Project, rel1);
        let abs2 = env.index.absolute(DocType::Project, rel2);
        if !abs1.exists() || !abs2.exists() {
            return DiffResponse::failure(format!(
                "错误: 文件未找到: {rel1}:{}, {rel2}:{}",
                abs1.exists(),
                abs2.exists()
            ))
            .to_json();
        }

        let ext1 = ext_of(&abs1);
        let ext2 = ext_of(&abs2);
        if !DIFFABLE_EXTS.contains(&ext1.as_str()) || !DIFFABLE_EXTS.contains(&ext2.as_str()) {
            return DiffResponse::failure(format!(
                "错误: {rel1}与{rel2} 文件无效，有效的文件名为:'.xlsx', '.pdf', '.docx'"
            ))
            .to_json();
        }
        if ext1 != ext2 {
            return DiffResponse::failure(format!(
                "错误: {rel1}与{rel2} 扩展名不一致，需使用扩展名一致的文件进行比较。"
            ))
            .to_json();
        }

        let header = format!("比较文件:\n  1. {rel1}\n  2. {rel2}\n");
        let compared = if document_type == TYPE_ESTIMATE {
            if ext1 != "xlsx" {
                return DiffResponse::failure(
                    "错误: 文件概算表比较仅支持xlsx格式，请检查文件格式",
                )
                .to_json();
            }
            if all_sheet {
                compare_all_sheets(&abs1, &abs2, &header).await
            } else {
                let Some(sheet) = sheet_name else {
                    return DiffResponse::failure(format!(
                        "错误: 文件类型 '{document_type}' (Excel) 且 all_sheet=False 时，需要提供 sheet_name 进行比较，请检查调用参数。"
                    ))
                    .to_json();
                };
                match compare_one_sheet(&abs1, &abs2, &sheet, &header).await {
                    Ok(compared) => compared,
                    Err(hint) => return DiffResponse::failure(hint).to_json(),
                }
            }
        } else {
            match compare_as_text(&abs1, &abs2, rel1, rel2, &header).await {
                Ok(compared) => compared,
                Err(hint) => return DiffResponse::failure(hint).to_json(),
            }
        };

        let (content, hint) = compared;
        let info1 = env.register_opened_file(user, rel1, DocType::Project);
        let info2 = env.register_opened_file(user, rel2, DocType::Project);
        let (Some((token1, url1)), Some((token2, url2))) = (info1, info2) else {
            return DiffResponse::failure("服务器内部错误：无法为文件注册会话。").to_json();
        };
        DiffResponse {
            content,
            hint,
            token1: Some(token1),
            token2: Some(token2),
            file_path1: Some(rel1.to_string()),
            file_path2: Some(rel2.to_string()),
            download_url1: Some(url1),
            download_url2: Some(url2),
        }
        .to_json()
    }
}

fn ext_of(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).unwrap_or_default()
}

fn file_name_of(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Compare every common sheet, and list the sheets unique to one side.
async fn compare_all_sheets(abs1: &Path, abs2: &Path, header: &str) -> (String, String) {
    let (p1, p2) = (abs1.to_path_buf(), abs2.to_path_buf());
    let (names1, names2) = tokio::task::spawn_blocking(move || {
        (
            parse::xlsx_sheet_names(&p1).unwrap_or_default(),
            parse::xlsx_sheet_names(&p2).unwrap_or_default(),
        )
    })
    .await
    .unwrap_or_default();

    let set1: BTreeSet<String> = names1.into_iter().collect();
    let set2: BTreeSet<String> = names2.into_iter().collect();
    let common: Vec<&String> = set1.intersection(&set2).collect();
    let only1: Vec<&String> = set1.difference(&set2).collect();
    let only2: Vec<&String> = set2.difference(&set1).collect();

    let mut out = vec![header.to_string()];
    if common.is_empty() && only1.is_empty() && only2.is_empty() {
        out.push("两个Excel文件均不包含任何sheet页，或无法读取sheet列表。\n".to_string());
        return ("N/A".to_string(), out.join(""));
    }

    if !common.is_empty() {
        out.push("--- 共同存在的Sheet比较结果 ---\n".to_string());
        for sheet in common {
            let sheet_header = format!("Sheet名称: {sheet}\n{}\n", "-".repeat(30));
            match sheet_lines_pair(abs1, abs2, sheet).await {
                (lines1, lines2) if lines1.is_empty() && lines2.is_empty() => out.push(format!(
                    "{sheet_header}Sheet '{sheet}': 无法解析文件1和文件2的此sheet内容，或内容均为空。\n\n"
                )),
                (lines1, _) if lines1.is_empty() => out.push(format!(
                    "{sheet_header}Sheet '{sheet}': 无法解析文件1的此sheet内容，或内容为空。\n\n"
                )),
                (_, lines2) if lines2.is_empty() => out.push(format!(
                    "{sheet_header}Sheet '{sheet}': 无法解析文件2的此sheet内容，或内容为空。\n\n"
                )),
                (lines1, lines2) => {
                    match unified_diff(&lines1.join("\n"), &lines2.join("\n")) {
                        None => out.push(format!("{sheet_header}Sheet '{sheet}': 内容一致。\n\n")),
                        Some(diff) => out.push(format!(
                            "{sheet_header}Sheet '{sheet}': 差异内容如下:\n{diff}\n\n"
                        )),
                    }
                }
            }
        }
    }
    if !only1.is_empty() {
        out.push(format!("--- 仅存在于文件 '{}' 的Sheet ---\n", file_name_of(abs1)));
        for sheet in only1 {
            out.push(format!("- {sheet}\n"));
        }
        out.push("\n".to_string());
    }
    if !only2.is_empty() {
        out.push(format!("--- 仅存在于文件 '{}' 的Sheet ---\n", file_name_of(abs2)));
        for sheet in only2 {
            out.push(format!("- {sheet}\n"));
        }
        out.push("\n".to_string());
    }
    (out.join(""), "请整理差异内容后输出，不要遗漏".to_string())
}

async fn sheet_lines_pair(abs1: &Path, abs2: &Path, sheet: &str) -> (Vec<String>, Vec<String>) {
    let (p1, p2, s) = (abs1.to_path_buf(), abs2.to_path_buf(), sheet.to_string());
    tokio::task::spawn_blocking(move || {
        (
            parse::xlsx_sheet_lines(&p1, &s, "\t").unwrap_or_default(),
            parse::xlsx_sheet_lines(&p2, &s, "\t").unwrap_or_default(),
        )
    })
    .await
    .unwrap_or_default()
}

async fn compare_one_sheet(
    abs1: &Path,
    abs2: &Path,
    sheet: &str,
    header: &str,
) -> Result<(String, String), String> {
    let sheet_header = format!("{header}Sheet名称: {sheet}\n{}\n", "-".repeat(30));
    let (lines1, lines2) = sheet_lines_pair(abs1, abs2, sheet).await;
    if lines1.is_empty() || lines2.is_empty() {
        let which = if lines1.is_empty() { abs1 } else { abs2 };
        return Err(format!(
            "{sheet_header}错误: 无法解析{}的Sheet '{sheet}' 内容，或内容均为空。",
            file_name_of(which)
        ));
    }
    match unified_diff(&lines1.join("\n"), &lines2.join("\n")) {
        None => Ok((
            format!("{sheet_header}无差异"),
            format!("Sheet '{sheet}'完全一致。"),
        )),
        Some(diff) => Ok((
            format!("{sheet_header}{diff}"),
            "请整理差异内容后输出，不要遗漏".to_string(),
        )),
    }
}

async fn compare_as_text(
    abs1: &Path,
    abs2: &Path,
    rel1: &str,
    rel2: &str,
    header: &str,
) -> Result<(String, String), String> {
    let (p1, p2) = (abs1.to_path_buf(), abs2.to_path_buf());
    let contents = tokio::task::spawn_blocking(move || {
        (parse::read_by_extension(&p1), parse::read_by_extension(&p2))
    })
    .await;
    let (content1, content2) = match contents {
        Ok(pair) => pair,
        Err(e) => return Err(format!("错误: 比较任务失败: {e}，检查日志。")),
    };
    let (content1, content2) = match (content1, content2) {
        (Ok(a), Ok(b)) => (a, b),
        (a, b) => {
            return Err(format!(
                "错误:解析文件1 ({rel1}) 结果: {}--解析文件2 ({rel2}) 结果: {}请检查日志",
                summarize(&a),
                summarize(&b)
            ))
        }
    };

    let file_header = format!("{header}{}\n", "-".repeat(30));
    match unified_diff(&content1, &content2) {
        None => Ok((
            format!("{file_header}无差异"),
            format!("文本文件 '{rel1}' 和 '{rel2}' 内容一致。"),
        )),
        Some(diff) => Ok((
            format!("{header}{diff}"),
            "请整理差异内容后输出，不要遗漏".to_string(),
        )),
    }
}

fn summarize(result: &Result<String, parse::ParseError>) -> String {
    match result {
        Ok(_) => "成功".to_string(),
        Err(e) => {
            let text = e.to_string();
            text.chars().take(50).collect()
        }
    }
}
