// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::auth::{SessionCookie, COOKIE_NAME};
use crate::state::test_state;
use axum_extra::extract::cookie::Cookie;

#[tokio::test]
async fn router_builds_with_every_route() {
    let dir = tempfile::tempdir().unwrap();
    let _router = build_router(test_state(dir.path()));
}

#[tokio::test]
async fn require_user_accepts_live_session() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    state.sessions.attempt_login("alice", "1.1.1.1", "S1");

    let value = SessionCookie { username: "alice".into(), session_id: "S1".into() }
        .encode(state.secret());
    let jar = CookieJar::new().add(Cookie::new(COOKIE_NAME, value));
    assert_eq!(require_user(&state, &jar).unwrap(), "alice");
}

#[tokio::test]
async fn require_user_rejects_absent_cookie() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let jar = CookieJar::new();
    assert!(require_user(&state, &jar).is_err());
}

#[tokio::test]
async fn optional_user_needs_only_a_signature() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let value = SessionCookie { username: "bob".into(), session_id: "S2".into() }
        .encode(state.secret());
    let jar = CookieJar::new().add(Cookie::new(COOKIE_NAME, value));
    assert_eq!(optional_user(&state, &jar).as_deref(), Some("bob"));
    assert!(optional_user(&state, &CookieJar::new()).is_none());
}

#[test]
fn mime_mapping_defaults_to_binary() {
    assert_eq!(download::mime_for_extension("pdf"), "application/pdf");
    assert_eq!(
        download::mime_for_extension("docx"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    assert_eq!(download::mime_for_extension("weird"), "application/octet-stream");
}
