// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end token capability flow: open a real file through the session
//! layer, resolve its token, stream it through the file service.

use dd_core::{DocType, FakeClock};
use dd_files::FileService;
use dd_session::SessionManager;
use std::time::Duration;

#[tokio::test]
async fn opened_file_token_streams_until_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dd_core::test_support::test_config(dir.path());
    let roots = cfg.document_roots();

    // a real file under the projects root
    let fs = FileService::new(roots.projects.clone()).unwrap();
    fs.save_bytes(b"report body".to_vec(), "2024/X/送审/R.pdf").await.unwrap();

    let clock = FakeClock::new();
    let sessions = SessionManager::with_clock(roots, 3600, 60, clock.clone());
    assert!(sessions.attempt_login("alice", "1.1.1.1", "S1"));

    let entry = sessions
        .update_opened_file("alice", "2024/X/送审/R.pdf", true, DocType::Project)
        .unwrap();

    // the token resolves to the absolute path the file service wrote
    let info = sessions.get_downloadable_file_info(&entry.token).unwrap();
    assert_eq!(std::fs::read(&info.abs_path).unwrap(), b"report body");

    // sweep after expiry: the capability is gone
    clock.advance(Duration::from_secs(61));
    sessions.cleanup_expired_opened_files();
    assert!(sessions.get_downloadable_file_info(&entry.token).is_none());
}

#[tokio::test]
async fn login_exclusivity_full_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dd_core::test_support::test_config(dir.path());
    let sessions = SessionManager::new(cfg.document_roots(), 3600, 60);

    assert!(sessions.attempt_login("alice", "1.1.1.1", "S1"));
    assert!(!sessions.attempt_login("alice", "2.2.2.2", "S2"));
    assert!(sessions.logout("alice"));
    assert!(sessions.attempt_login("alice", "2.2.2.2", "S3"));
    assert_eq!(sessions.session_id_of("alice").as_deref(), Some("S3"));
}
