// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in tool set.

mod diff_tool;
mod kb_tool;
mod project;
mod read;
mod review;
mod spec;

use crate::host::ToolHost;
use std::sync::Arc;

/// Argument helpers shared by the tool impls.
pub(crate) mod args {
    use serde_json::Value;

    pub fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
        args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn bool_arg(args: &Value, key: &str, default: bool) -> bool {
        args.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn usize_arg(args: &Value, key: &str, default: usize) -> usize {
        args.get(key).and_then(Value::as_u64).map(|n| n as usize).unwrap_or(default)
    }
}

/// Register every built-in tool on the host.
pub fn register_builtin_tools(host: &mut ToolHost) {
    host.register(Arc::new(project::QueryProjectFiles));
    host.register(Arc::new(spec::OpenSpecificationFiles));
    host.register(Arc::new(read::ReadProjectFile));
    host.register(Arc::new(diff_tool::DiffProjectFile));
    host.register(Arc::new(kb_tool::QueryKnowledgeBase));
    host.register(Arc::new(review::WriteReviewDoc));
}
