// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route table and shared HTTP plumbing.

mod download;
mod editor;
mod preview;
mod projects;
mod session;
mod upload;
mod ws;

use crate::auth::{verify_active_session, AuthCheck};
use crate::state::AppState;
use axum::extract::Request;
use axum::http::{StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Assemble the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(session::login))
        .route("/logout", get(session::logout))
        .route("/api/user/status", get(session::user_status))
        .route("/debug/session-states", get(session::debug_session_states))
        .route(
            "/api/projects/search",
            get(projects::search_get).post(projects::search_post),
        )
        .route("/download/:token/*filename", get(download::download_by_token))
        .route("/spec_images/*name", get(download::spec_image))
        .route("/ws/v2/chat", get(ws::chat_ws))
        .route("/ws_chat_stream", get(ws::legacy_ws))
        .route(
            "/api/upload-project",
            get(upload::project_get).post(upload::project_post),
        )
        .route(
            "/api/upload-standards",
            get(upload::standards_get).post(upload::standards_post),
        )
        .route(
            "/api/upload-files",
            get(upload::files_get).post(upload::files_post),
        )
        .route("/kkfileview/onlinePreview", get(preview::online_preview))
        .route("/kkfileview/*path", any(preview::asset_proxy))
        .route("/onlyoffice/editor", get(editor::editor_page))
        .route("/onlyoffice/callback", post(editor::save_callback))
        .layer(middleware::from_fn(rewrite_static_images))
        // uploads carry whole document trees; the 2 MB default is far too low
        .layer(axum::extract::DefaultBodyLimit::max(512 * 1024 * 1024))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Legacy clients fetch spec images under `/static/images/<name>`; map those
/// onto the index-backed endpoint.
async fn rewrite_static_images(mut request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if let Some(name) = path.strip_prefix("/static/images/") {
        let rewritten = format!("/spec_images/{name}");
        if let Ok(uri) = rewritten.parse::<Uri>() {
            *request.uri_mut() = uri;
        }
    }
    next.run(request).await
}

/// Strict auth for plain handlers: the username, or the ready-made 401.
pub(crate) fn require_user(state: &AppState, jar: &CookieJar) -> Result<String, Response> {
    let cookie = jar.get(crate::auth::COOKIE_NAME).map(|c| c.value().to_string());
    match verify_active_session(state.secret(), &state.sessions, cookie.as_deref()) {
        AuthCheck::Verified(user) => Ok(user),
        AuthCheck::Conflict => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "status": "error", "message": "session conflict" })),
        )
            .into_response()),
        AuthCheck::Denied => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "status": "error", "message": "未登录或会话已失效" })),
        )
            .into_response()),
    }
}

/// Weak auth: any validly signed cookie names the user.
pub(crate) fn optional_user(state: &AppState, jar: &CookieJar) -> Option<String> {
    let cookie = jar.get(crate::auth::COOKIE_NAME)?;
    crate::auth::current_user(state.secret(), Some(cookie.value())).map(|c| c.username)
}

/// Uniform JSON error reply.
pub(crate) fn error_reply(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "status": "error", "message": message.into() })),
    )
        .into_response()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
