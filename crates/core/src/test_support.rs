// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures shared by other crates' tests.

use crate::config::Config;
use std::path::Path;

/// Config rooted at a temp directory, with an in-memory index store and one
/// test user. Creates the three document root directories.
pub fn test_config(base: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.roots.projects_root = base.join("projects");
    cfg.roots.spec_root = base.join("specs");
    cfg.roots.management_root = base.join("management");
    cfg.roots.conversation_root = base.join("chat_history");
    cfg.roots.output_root = base.join("generated");
    cfg.roots.template_root = base.join("templates");
    cfg.index.store_path = ":memory:".to_string();
    cfg.server.session_secret = "test-secret".to_string();
    cfg.session.users.insert("alice".to_string(), "wonderland".to_string());
    for dir in [
        &cfg.roots.projects_root,
        &cfg.roots.spec_root,
        &cfg.roots.management_root,
    ] {
        let _ = std::fs::create_dir_all(dir);
    }
    cfg
}
