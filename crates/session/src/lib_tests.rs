// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dd_core::FakeClock;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

const TIMEOUT: u64 = 3600;
const VALIDITY: u64 = 60;

fn manager() -> SessionManager<FakeClock> {
    let roots = DocumentRoots {
        projects: PathBuf::from("/p"),
        specs: PathBuf::from("/s"),
        management: PathBuf::from("/m"),
    };
    SessionManager::with_clock(roots, TIMEOUT, VALIDITY, FakeClock::new())
}

fn clock_of(mgr: &SessionManager<FakeClock>) -> FakeClock {
    mgr.clock.clone()
}

#[test]
fn login_is_exclusive_within_idle_window() {
    let mgr = manager();
    assert!(mgr.attempt_login("alice", "1.1.1.1", "S1"));
    assert!(!mgr.attempt_login("alice", "2.2.2.2", "S2"));

    // logout clears the exclusivity immediately
    assert!(mgr.logout("alice"));
    assert!(mgr.attempt_login("alice", "2.2.2.2", "S3"));
}

#[test]
fn logout_closes_attached_socket() {
    let mgr = manager();
    mgr.attempt_login("alice", "1.1.1.1", "S1");
    let (tx, mut rx) = mpsc::unbounded_channel();
    mgr.connect_websocket("alice", "S1", tx).unwrap();

    assert!(mgr.logout("alice"));
    match rx.try_recv().unwrap() {
        SinkMessage::Close { code, reason } => {
            assert_eq!(code, 1000);
            assert_eq!(reason, "logout");
        }
        other => panic!("expected close, got {other:?}"),
    }
}

#[test]
fn stale_session_is_replaced_by_new_login() {
    let mgr = manager();
    let clock = clock_of(&mgr);
    assert!(mgr.attempt_login("alice", "1.1.1.1", "S1"));
    clock.advance(Duration::from_secs(TIMEOUT + 1));
    assert!(mgr.attempt_login("alice", "2.2.2.2", "S2"));
    assert_eq!(mgr.session_id_of("alice").as_deref(), Some("S2"));
}

#[test]
fn http_activity_extends_the_window() {
    let mgr = manager();
    let clock = clock_of(&mgr);
    mgr.attempt_login("alice", "1.1.1.1", "S1");
    clock.advance(Duration::from_secs(TIMEOUT - 10));
    mgr.set_http_activity("alice");
    clock.advance(Duration::from_secs(TIMEOUT - 10));
    // still active thanks to the refresh
    assert!(!mgr.attempt_login("alice", "2.2.2.2", "S2"));
}

#[test]
fn validate_session_distinguishes_failures() {
    let mgr = manager();
    let clock = clock_of(&mgr);
    assert_eq!(mgr.validate_session("alice", "S1"), SessionValidation::Missing);

    mgr.attempt_login("alice", "1.1.1.1", "S1");
    assert_eq!(mgr.validate_session("alice", "S1"), SessionValidation::Ok);
    assert_eq!(mgr.validate_session("alice", "WRONG"), SessionValidation::Conflict);

    clock.advance(Duration::from_secs(TIMEOUT));
    assert_eq!(mgr.validate_session("alice", "S1"), SessionValidation::Expired);
}

#[test]
fn websocket_attach_requires_matching_session() {
    let mgr = manager();
    mgr.attempt_login("alice", "1.1.1.1", "S1");

    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(mgr.connect_websocket("alice", "WRONG", tx).is_err());

    let (tx, mut rx) = mpsc::unbounded_channel();
    assert!(mgr.connect_websocket("alice", "S1", tx).is_ok());

    // attached sink receives pushes
    mgr.update_opened_file("alice", "2024/X/送审/R.pdf", true, DocType::Project);
    match rx.try_recv().unwrap() {
        SinkMessage::Event(OutboundMessage::FileOpenRequest { payload }) => {
            assert_eq!(payload.filename, "R.pdf");
            assert_eq!(payload.format, "pdf");
        }
        other => panic!("expected file_open_request, got {other:?}"),
    }

    mgr.disconnect_websocket("alice");
    mgr.update_opened_file("alice", "2024/X/送审/R2.pdf", true, DocType::Project);
    assert!(rx.try_recv().is_err());
}

#[test]
fn token_resolves_until_expiry() {
    let mgr = manager();
    let clock = clock_of(&mgr);
    mgr.attempt_login("alice", "1.1.1.1", "S1");

    let entry = mgr
        .update_opened_file("alice", "2024/X/送审/R.pdf", true, DocType::Project)
        .unwrap();
    assert_eq!(entry.token.len(), 32);

    let info = mgr.get_downloadable_file_info(&entry.token).unwrap();
    assert_eq!(info.rel_path, "2024/X/送审/R.pdf");
    assert_eq!(info.file_name, "R.pdf");
    assert_eq!(info.abs_path, PathBuf::from("/p/2024/X/送审/R.pdf"));

    // still valid one second before expiry
    clock.advance(Duration::from_secs(VALIDITY - 1));
    assert!(mgr.get_downloadable_file_info(&entry.token).is_some());

    // gone at expiry
    clock.advance(Duration::from_secs(1));
    assert!(mgr.get_downloadable_file_info(&entry.token).is_none());
}

#[test]
fn duplicate_opens_mint_distinct_tokens() {
    let mgr = manager();
    mgr.attempt_login("alice", "1.1.1.1", "S1");
    let a = mgr.update_opened_file("alice", "x/y.pdf", true, DocType::Project).unwrap();
    let b = mgr.update_opened_file("alice", "x/y.pdf", true, DocType::Project).unwrap();
    assert_ne!(a.token, b.token);
    assert!(mgr.get_downloadable_file_info(&a.token).is_some());
    assert!(mgr.get_downloadable_file_info(&b.token).is_some());
}

#[test]
fn working_directory_is_replaced_not_merged() {
    let mgr = manager();
    mgr.attempt_login("alice", "1.1.1.1", "S1");

    let first = mgr
        .update_opened_dir(
            "alice",
            "2024/工程A",
            vec!["2024/工程A/送审/r.pdf".to_string()],
            DocType::Project,
        )
        .unwrap();
    let old_token = first.files[0].token.clone();
    assert!(mgr.get_downloadable_file_info(&old_token).is_some());

    mgr.update_opened_dir(
        "alice",
        "2024/工程B",
        vec!["2024/工程B/送审/s.pdf".to_string()],
        DocType::Project,
    )
    .unwrap();

    // the replaced directory's tokens are discarded
    assert!(mgr.get_downloadable_file_info(&old_token).is_none());
}

#[test]
fn directory_update_event_carries_files() {
    let mgr = manager();
    mgr.attempt_login("alice", "1.1.1.1", "S1");
    let (tx, mut rx) = mpsc::unbounded_channel();
    mgr.connect_websocket("alice", "S1", tx).unwrap();

    mgr.update_opened_dir(
        "alice",
        "2024/工程A",
        vec!["2024/工程A/送审/r.pdf".to_string(), "2024/工程A/收口/s.docx".to_string()],
        DocType::Project,
    );
    match rx.try_recv().unwrap() {
        SinkMessage::Event(OutboundMessage::DirectoryUpdate { payload }) => {
            assert_eq!(payload.directory, "2024/工程A");
            assert_eq!(payload.files.len(), 2);
            assert_eq!(payload.files[1].format, "docx");
        }
        other => panic!("expected directory_update, got {other:?}"),
    }
}

#[test]
fn editing_key_shared_per_file_user_ids_distinct() {
    let mgr = manager();
    mgr.attempt_login("alice", "1.1.1.1", "S1");
    mgr.attempt_login("bob", "3.3.3.3", "S2");

    let (alice_uid, key1) = mgr.register_editing_file("alice", "2024/A/送审/r.docx").unwrap();
    let (bob_uid, key2) = mgr.register_editing_file("bob", "2024/A/送审/r.docx").unwrap();
    assert_eq!(key1, key2, "collaborators share the file key");
    assert_ne!(alice_uid, bob_uid, "each collaborator gets a fresh user id");

    assert_eq!(mgr.get_editing_file(&key1).as_deref(), Some("2024/A/送审/r.docx"));

    mgr.remove_editing_file(&key1);
    assert!(mgr.get_editing_file(&key1).is_none());
}

#[test]
fn different_files_get_different_keys() {
    let mgr = manager();
    mgr.attempt_login("alice", "1.1.1.1", "S1");
    mgr.attempt_login("bob", "3.3.3.3", "S2");
    let (_, key1) = mgr.register_editing_file("alice", "a.docx").unwrap();
    let (_, key2) = mgr.register_editing_file("bob", "b.docx").unwrap();
    assert_ne!(key1, key2);
}

#[test]
fn cleanup_sweeps_expired_entries() {
    let mgr = manager();
    let clock = clock_of(&mgr);
    mgr.attempt_login("alice", "1.1.1.1", "S1");
    let entry = mgr.update_opened_file("alice", "x/a.pdf", true, DocType::Project).unwrap();
    mgr.update_opened_dir("alice", "d", vec!["d/b.pdf".to_string()], DocType::Project);

    clock.advance(Duration::from_secs(VALIDITY + 1));
    mgr.set_http_activity("alice"); // keep the session itself alive
    mgr.cleanup_expired_opened_files();

    assert!(mgr.get_downloadable_file_info(&entry.token).is_none());
    let states = mgr.session_states();
    assert_eq!(states["sessions"][0]["working_files"].as_array().unwrap().len(), 0);
    assert!(states["sessions"][0]["working_directory"].is_null());
}

#[test]
fn idle_sweep_evicts_and_closes_sockets() {
    let mgr = manager();
    let clock = clock_of(&mgr);
    mgr.attempt_login("alice", "1.1.1.1", "S1");
    mgr.attempt_login("bob", "2.2.2.2", "S2");
    let (tx, mut rx) = mpsc::unbounded_channel();
    mgr.connect_websocket("alice", "S1", tx).unwrap();

    clock.advance(Duration::from_secs(TIMEOUT / 2));
    mgr.set_http_activity("bob");
    clock.advance(Duration::from_secs(TIMEOUT / 2));

    let evicted = mgr.process_inactive_sessions();
    assert_eq!(evicted, vec!["alice".to_string()]);
    assert_eq!(mgr.active_user_count(), 1);
    match rx.try_recv().unwrap() {
        SinkMessage::Close { code, .. } => assert_eq!(code, 1001),
        other => panic!("expected close, got {other:?}"),
    }
}

#[test]
fn operations_on_unknown_user_are_noops() {
    let mgr = manager();
    assert!(mgr.update_opened_file("ghost", "x.pdf", true, DocType::Project).is_none());
    assert!(mgr.update_opened_dir("ghost", "d", vec![], DocType::Project).is_none());
    assert!(mgr.register_editing_file("ghost", "f.docx").is_none());
    mgr.set_http_activity("ghost");
    mgr.clear_working_directory("ghost");
    assert!(!mgr.logout("ghost"));
}
