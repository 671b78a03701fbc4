// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool registry and in-process dispatch.

use crate::env::ToolEnv;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// One callable capability. `invoke` returns the tool's serialized response;
/// implementations convert their own failures into error-shaped JSON.
#[async_trait]
pub trait Tool: Send + Sync {
    /// OpenAI function-tool schema: `{type:"function", function:{name, …}}`.
    fn schema(&self) -> Value;

    async fn invoke(&self, env: &ToolEnv, user: &str, args: Value) -> String;
}

/// Name → tool registry surfaced to the LLM on every completion.
pub struct ToolHost {
    env: ToolEnv,
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolHost {
    pub fn new(env: ToolEnv) -> Self {
        Self { env, tools: BTreeMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool
            .schema()
            .pointer("/function/name")
            .and_then(Value::as_str)
            .unwrap_or("unnamed")
            .to_string();
        info!(tool = %name, "tool registered");
        self.tools.insert(name, tool);
    }

    /// The `tools` array for a chat completion request.
    pub fn schemas(&self) -> Vec<Value> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Dispatch one tool call. The raw argument text comes straight from the
    /// model; parse failures and unknown names become error responses the
    /// model can react to.
    pub async fn invoke(&self, name: &str, user: &str, raw_args: &str) -> String {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "unknown tool requested");
            return error_response(&format!("未知工具: {name}"), "请使用工具列表中的名称重试。");
        };
        let args: Value = if raw_args.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_str(raw_args) {
                Ok(v) => v,
                Err(e) => {
                    warn!(tool = %name, error = %e, "tool arguments failed to parse");
                    return error_response(
                        &format!("错误: 工具参数不是合法 JSON: {e}"),
                        "请检查参数格式后重试。",
                    );
                }
            }
        };
        tool.invoke(&self.env, user, args).await
    }
}

/// The universally understood error shape: `{content, hint}`.
pub fn error_response(content: &str, hint: &str) -> String {
    serde_json::json!({ "content": content, "hint": hint }).to_string()
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
