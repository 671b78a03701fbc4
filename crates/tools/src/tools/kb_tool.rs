// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Knowledge-base retrieval tool: one HTTP roundtrip behind a stable
//! response shape.

use super::args::{str_arg, usize_arg};
use crate::env::ToolEnv;
use crate::host::Tool;
use crate::kb::{format_records, KbError};
use crate::response::ToolResponse;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

pub struct QueryKnowledgeBase;

#[async_trait]
impl Tool for QueryKnowledgeBase {
    fn schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": "query_specification_knowledge_base",
                "description": "规程规范知识库检索工具，使用向量检索规程规范条文。",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "user_query": {
                            "type": "string",
                            "description": "需要查询的内容"
                        },
                        "knowledge_base_name": {
                            "type": "string",
                            "description": "知识库名称（电气、二次、通信、线路 之一）"
                        },
                        "top_k": {
                            "type": "integer",
                            "description": "返回的检索条数，默认取服务端配置"
                        }
                    },
                    "required": ["user_query", "knowledge_base_name"]
                }
            }
        })
    }

    async fn invoke(&self, env: &ToolEnv, user: &str, args: Value) -> String {
        let Some(query) = str_arg(&args, "user_query") else {
            return ToolResponse::new("错误: 缺少 user_query 参数。", "请提供查询内容后重试。")
                .to_json();
        };
        let Some(kb_name) = str_arg(&args, "knowledge_base_name") else {
            return ToolResponse::new(
                "错误: 缺少 knowledge_base_name 参数。",
                "请提供知识库名称后重试。",
            )
            .to_json();
        };
        let top_k = usize_arg(&args, "top_k", env.config.kb.top_k);
        info!(%user, kb = %kb_name, top_k, "query_specification_knowledge_base");

        match env.kb.retrieve(query, kb_name, top_k).await {
            Ok(records) if records.is_empty() => ToolResponse::new(
                format!("知识库 '{kb_name}' 未检索到与 '{query}' 相关的内容。"),
                "可以尝试更换查询关键词或检查知识库内容。",
            )
            .to_json(),
            Ok(records) => {
                let mut response = ToolResponse::new(
                    format_records(&records),
                    format!("已成功从知识库 '{kb_name}' 检索到 {} 条内容。", records.len()),
                );
                response.token = Some(dd_core::new_file_token());
                response.to_json()
            }
            Err(KbError::DatasetNotFound(_)) => ToolResponse::new(
                format!("错误: 未找到名为 '{kb_name}' 的知识库。"),
                "请检查知识库名称是否正确，可选值为：电气、二次、通信、线路。",
            )
            .to_json(),
            Err(e) => {
                warn!(error = %e, "knowledge base retrieval failed");
                ToolResponse::new(
                    format!("错误: 访问知识库服务时发生网络错误: {e}"),
                    "请检查网络连接或稍后再试。",
                )
                .to_json()
            }
        }
    }
}
