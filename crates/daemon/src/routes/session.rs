// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Login, logout and session status.

use super::{error_reply, optional_user, require_user};
use crate::auth::{SessionCookie, COOKIE_NAME};
use crate::state::AppState;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// `POST /login` — credential check plus the exclusive-login gate.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<LoginForm>,
) -> Response {
    let client_ip = addr.ip().to_string();
    if form.username.is_empty() || form.password.is_empty() {
        return error_reply(StatusCode::BAD_REQUEST, "请输入用户名和密码");
    }

    let valid = state
        .config
        .session
        .users
        .get(&form.username)
        .map(|expected| expected == &form.password)
        .unwrap_or(false);
    if !valid {
        warn!(user = %form.username, ip = %client_ip, "bad credentials");
        return error_reply(StatusCode::UNAUTHORIZED, "用户名或密码错误");
    }

    // reuse the session id of a still-valid cookie so a re-login from the
    // same browser keeps its identity
    let session_id = jar
        .get(COOKIE_NAME)
        .and_then(|c| SessionCookie::decode(state.secret(), c.value()))
        .filter(|c| c.username == form.username)
        .map(|c| c.session_id)
        .unwrap_or_else(dd_core::new_session_id);

    if !state.sessions.attempt_login(&form.username, &client_ip, &session_id) {
        return error_reply(StatusCode::CONFLICT, "用户已在其他地方登录或活动，请先登出。");
    }

    info!(user = %form.username, ip = %client_ip, "login ok");
    let cookie_value = SessionCookie {
        username: form.username.clone(),
        session_id,
    }
    .encode(state.secret());
    let cookie = Cookie::build((COOKIE_NAME, cookie_value))
        .path("/")
        .http_only(true)
        .build();
    (
        jar.add(cookie),
        Json(serde_json::json!({ "status": "ok", "message": "登录成功" })),
    )
        .into_response()
}

/// `GET /logout` — clears cookie and in-memory session, back to the login page.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(user) = optional_user(&state, &jar) {
        state.sessions.logout(&user);
        info!(user = %user, "http logout");
    }
    let jar = jar.remove(Cookie::build((COOKIE_NAME, "")).path("/").build());
    (jar, Redirect::to("/static/login.html")).into_response()
}

/// `GET /api/user/status`
pub async fn user_status(State(state): State<AppState>, jar: CookieJar) -> Response {
    let user = match require_user(&state, &jar) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match state.sessions.session_id_of(&user) {
        Some(session_id) => {
            Json(serde_json::json!({ "username": user, "session_id": session_id }))
                .into_response()
        }
        None => error_reply(StatusCode::INTERNAL_SERVER_ERROR, "内部会话错误"),
    }
}

/// `GET /debug/session-states` — intentionally unauthenticated, matching the
/// legacy deployment's operational probe.
pub async fn debug_session_states(State(state): State<AppState>) -> Response {
    Json(state.sessions.session_states()).into_response()
}
