// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reverse proxy to the kkFileView-compatible preview service.
//!
//! The preview upstream caches by filename, so the encoder endpoint splices
//! an 8-hex token into the filename before base64+URL-encoding the target —
//! two files sharing a name never collide in its cache.

use super::{error_reply, optional_user, require_user};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, RawQuery, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    #[serde(default)]
    pub file_url: Option<String>,
}

/// `GET /kkfileview/onlinePreview?file_url=…`
pub async fn online_preview(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<PreviewQuery>,
) -> Response {
    let user = match require_user(&state, &jar) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Some(file_url) = query.file_url.filter(|u| !u.is_empty()) else {
        return error_reply(StatusCode::BAD_REQUEST, "缺少 'file_url' 参数。");
    };
    debug!(user = %user, url = %file_url, "preview requested");

    let busted = cache_busted_url(&file_url, &dd_core::new_cache_buster());
    let encoded = urlencoding::encode(&BASE64.encode(busted.as_bytes())).into_owned();
    let target = format!(
        "{}/onlinePreview?url={encoded}",
        state.config.preview.base_url.trim_end_matches('/')
    );

    forward(&state, reqwest::Method::GET, &target, HeaderMap::new(), Vec::new()).await
}

/// `ANY /kkfileview/{path}` — streaming pass-through for the viewer's own
/// assets and APIs.
pub async fn asset_proxy(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(path): Path<String>,
    RawQuery(raw_query): RawQuery,
    request: Request,
) -> Response {
    // anonymous asset fetches are allowed; a user, when present, is logged
    let user = optional_user(&state, &jar);
    debug!(user = ?user, path = %path, "preview asset proxy");

    let mut target = format!(
        "{}/{path}",
        state.config.preview.base_url.trim_end_matches('/')
    );
    if let Some(raw_query) = raw_query {
        target.push('?');
        target.push_str(&raw_query);
    }

    let method = match reqwest::Method::from_bytes(request.method().as_str().as_bytes()) {
        Ok(method) => method,
        Err(_) => return error_reply(StatusCode::METHOD_NOT_ALLOWED, "不支持的方法"),
    };
    let mut headers = HeaderMap::new();
    for (name, value) in request.headers() {
        let skip = matches!(
            name.as_str(),
            "host" | "cookie" | "authorization" | "connection" | "upgrade-insecure-requests"
        );
        if !skip {
            headers.insert(name.clone(), value.clone());
        }
    }
    let body = match axum::body::to_bytes(request.into_body(), 32 * 1024 * 1024).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => return error_reply(StatusCode::BAD_REQUEST, format!("请求体读取失败: {e}")),
    };

    forward(&state, method, &target, headers, body).await
}

/// Rewrite the URL's filename to `name_<token>.ext`.
fn cache_busted_url(file_url: &str, token: &str) -> String {
    let (prefix, rest) = match file_url.rsplit_once('/') {
        Some((prefix, rest)) => (Some(prefix), rest),
        None => (None, file_url),
    };
    // keep any query string attached to the last segment intact
    let (filename, query) = match rest.split_once('?') {
        Some((filename, query)) => (filename, Some(query)),
        None => (rest, None),
    };
    let busted = match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{token}.{ext}"),
        None => format!("{filename}_{token}"),
    };
    let mut out = String::new();
    if let Some(prefix) = prefix {
        out.push_str(prefix);
        out.push('/');
    }
    out.push_str(&busted);
    if let Some(query) = query {
        out.push('?');
        out.push_str(query);
    }
    out
}

/// Stream the upstream's reply back, status and headers included.
async fn forward(
    state: &AppState,
    method: reqwest::Method,
    target: &str,
    headers: HeaderMap,
    body: Vec<u8>,
) -> Response {
    let timeout = Duration::from_secs(state.config.preview.http_timeout_secs.max(1));
    let result = state
        .http
        .request(method, target)
        .timeout(timeout)
        .headers(headers)
        .body(body)
        .send()
        .await;
    let upstream = match result {
        Ok(upstream) => upstream,
        Err(e) => {
            warn!(target = %target, error = %e, "preview upstream failed");
            return error_reply(StatusCode::BAD_GATEWAY, format!("预览服务请求失败: {e}"));
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream.headers() {
        // hop-by-hop headers stay out of the relayed response
        let skip = matches!(name.as_str(), "connection" | "transfer-encoding" | "keep-alive");
        if !skip {
            response_headers.insert(name.clone(), value.clone());
        }
    }
    let stream = upstream.bytes_stream();
    (status, response_headers, Body::from_stream(stream)).into_response()
}

#[cfg(test)]
#[path = "preview_tests.rs"]
mod tests;
