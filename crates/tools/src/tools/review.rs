// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-stage review-document generation: first hand the model the template
//! manual, then render the filled template into the user's project tree.

use super::args::{bool_arg, str_arg};
use crate::env::ToolEnv;
use crate::host::Tool;
use crate::render::render_docx_template;
use crate::response::ToolResponse;
use async_trait::async_trait;
use dd_core::DocType;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

/// Generated drafts land under the working project's records subtree.
const DRAFT_SUBDIR: &str = "过程文件/评审意见草稿";

pub struct WriteReviewDoc;

#[async_trait]
impl Tool for WriteReviewDoc {
    fn schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": "write_review_doc",
                "description": "根据模板生成评审意见文档。二阶段工具：先以 get_manual=true 获取模板指令，按指令准备 project_name 和 content 后，再以 get_manual=false 生成文档。",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "template_type": {
                            "type": "string",
                            "description": "模板类型名称，例如 \"主变扩建工程模板\""
                        },
                        "project_name": {
                            "type": "string",
                            "description": "项目名称，get_manual=false 时必填"
                        },
                        "content": {
                            "type": "string",
                            "description": "JSON 字符串，包含按模板指令准备的字段，get_manual=false 时必填"
                        },
                        "get_manual": {
                            "type": "boolean",
                            "description": "为 true 返回模板操作指令，为 false 生成文档。默认 true"
                        }
                    },
                    "required": ["template_type"]
                }
            }
        })
    }

    async fn invoke(&self, env: &ToolEnv, user: &str, args: Value) -> String {
        let template_type = str_arg(&args, "template_type").unwrap_or("主变扩建工程模板");
        let get_manual = bool_arg(&args, "get_manual", true);
        info!(%user, template = %template_type, get_manual, "write_review_doc");

        let template_root = env.config.roots.template_root.clone();
        let template_docx = template_root.join(format!("{template_type}.docx"));
        let instruction = template_root.join(format!("{template_type}_template_instruction.txt"));

        if get_manual {
            // stage one answers plain text, not the JSON shape
            return match tokio::fs::read_to_string(&instruction).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %instruction.display(), error = %e, "template manual missing");
                    format!(
                        "错误: 找不到指令文件: {}。请检查模板类型是否正确。",
                        instruction.display()
                    )
                }
            };
        }

        let (Some(project_name), Some(content)) =
            (str_arg(&args, "project_name"), str_arg(&args, "content"))
        else {
            return ToolResponse::new(
                "参数错误, 当 get_manual=False 时, 'project_name' 和 'content' 和 template_type不能为空。",
                "请提供项目名称和内容后重试。",
            )
            .to_json();
        };

        let context = match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return ToolResponse::new(
                    "错误: content 必须是 JSON 对象。",
                    "请检查 content 参数是否为合法的 JSON 格式。",
                )
                .to_json()
            }
            Err(e) => {
                return ToolResponse::new(
                    format!("错误: 无法解析 content JSON: {e}"),
                    "请检查 content 参数是否为合法的 JSON 格式。",
                )
                .to_json()
            }
        };

        let output_filename = format!("（二次）{project_name}评审意见.docx");
        let (abs_output, rel_output) = self.output_paths(env, user, &output_filename);

        let template = template_docx.clone();
        let output = abs_output.clone();
        let rendered =
            tokio::task::spawn_blocking(move || render_docx_template(&template, &output, &context))
                .await;
        match rendered {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return ToolResponse::new(format!("错误: {e}"), "请检查模板文件是否存在。")
                    .to_json()
            }
            Err(e) => {
                return ToolResponse::new(
                    format!("错误: 渲染任务失败: {e}"),
                    "生成文档时发生未知错误，请联系管理员。",
                )
                .to_json()
            }
        }

        // generated files should appear in the index without waiting out the
        // watcher debounce
        if let Err(e) = env.index.upsert_path(&abs_output).await {
            warn!(path = %abs_output.display(), error = %e, "post-render index upsert failed");
        }

        match rel_output {
            Some(rel) => match env.register_opened_file(user, &rel, DocType::Project) {
                Some((token, download_url)) => ToolResponse {
                    content: format!("成功生成评审意见文档: {rel}"),
                    hint: format!("已生成下载链接: {download_url}"),
                    token: Some(token),
                    download_url: Some(download_url),
                    file_path: Some(rel),
                },
                None => ToolResponse::new(
                    format!("成功生成文档，但无法注册会话: {}", abs_output.display()),
                    "服务器内部错误：无法为文件注册会话。",
                ),
            }
            .to_json(),
            None => ToolResponse::new(
                format!("成功生成评审意见文档: {}", abs_output.display()),
                "文档已写入默认输出目录。",
            )
            .to_json(),
        }
    }
}

impl WriteReviewDoc {
    /// Prefer the user's working project tree; fall back to the configured
    /// output root (which yields no project-relative path, hence no token).
    fn output_paths(
        &self,
        env: &ToolEnv,
        user: &str,
        filename: &str,
    ) -> (PathBuf, Option<String>) {
        match env.sessions.working_directory_of(user) {
            Some(dir) if !dir.is_empty() => {
                let rel = format!("{dir}/{DRAFT_SUBDIR}/{filename}");
                (env.config.roots.projects_root.join(&rel), Some(rel))
            }
            _ => (env.config.roots.output_root.join(filename), None),
        }
    }
}
