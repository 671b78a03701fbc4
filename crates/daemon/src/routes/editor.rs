// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge to the OnlyOffice-compatible collaborative editor.
//!
//! The editor page embeds a signed config: the document URL is our download
//! endpoint for the caller's token, the document key is the shared edit key,
//! and the callback URL points back at `/onlyoffice/callback`, which writes
//! saved content over the original file via tempfile+rename.

use super::{error_reply, require_user};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dd_core::DocType;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct EditorQuery {
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /onlyoffice/editor?filepath=&token=`
pub async fn editor_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<EditorQuery>,
) -> Response {
    let user = match require_user(&state, &jar) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let (Some(filepath), Some(token)) = (query.filepath, query.token) else {
        return error_reply(StatusCode::BAD_REQUEST, "缺少 filepath 或 token 参数");
    };
    // the token must actually resolve before we hand it to the editor
    if state.sessions.get_downloadable_file_info(&token).is_none() {
        return error_reply(StatusCode::BAD_REQUEST, "无效的token或文件路径");
    }

    let filename = Path::new(&filepath)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| filepath.clone());
    let (file_ext, document_type) = document_family(&filename);

    let Some((user_id, file_key)) = state.sessions.register_editing_file(&user, &filepath)
    else {
        return error_reply(StatusCode::INTERNAL_SERVER_ERROR, "无法初始化编辑会话，请稍后重试。");
    };
    info!(user = %user, %user_id, %file_key, file = %filename, "editor session");

    let mut config = json!({
        "document": {
            "fileType": file_ext,
            "key": file_key,
            "title": filename,
            "url": format!("/download/{token}/{filename}"),
            "permissions": { "edit": true, "download": true, "comment": true },
        },
        "documentType": document_type,
        "editorConfig": {
            "callbackUrl": "/onlyoffice/callback",
            "user": { "id": user_id, "name": user },
            "customization": {
                "autosave": true,
                "forcesave": true,
                "close": { "visible": true, "text": "关闭文档" },
            },
            "lang": "zh-CN",
        },
    });
    if state.config.editor.jwt_enable {
        let jwt = sign_config(&config, &state.config.editor.jwt_secret);
        config["token"] = Value::String(jwt);
    }

    Html(editor_html(&filename, &config)).into_response()
}

/// Extension → OnlyOffice document family.
pub(crate) fn document_family(filename: &str) -> (String, &'static str) {
    let ext = filename.rsplit('.').next().unwrap_or_default().to_lowercase();
    let family = match ext.as_str() {
        "csv" | "et" | "ett" | "fods" | "numbers" | "ods" | "ots" | "sxc" | "xls" | "xlsb"
        | "xlsm" | "xlsx" | "xlt" | "xltm" | "xltx" => "cell",
        "dps" | "dpt" | "fodp" | "key" | "odp" | "otp" | "pot" | "potm" | "potx" | "pps"
        | "ppsm" | "ppsx" | "ppt" | "pptm" | "pptx" | "sxi" => "slide",
        "djvu" | "docxf" | "oform" | "oxps" | "pdf" | "xps" => "pdf",
        _ => "word",
    };
    (ext, family)
}

/// HS256 JWT over the whole config, the way the editor's `secret` mode
/// expects.
pub(crate) fn sign_config(config: &Value, secret: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(config.to_string().as_bytes());
    let signing_input = format!("{header}.{payload}");
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{signing_input}.{signature}")
}

fn editor_html(title: &str, config: &Value) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>OnlyOffice - {title}</title>
    <meta charset="utf-8">
    <script type="text/javascript" src="/onlyoffice-api/web-apps/apps/api/documents/api.js"></script>
    <style>
        html, body {{ margin: 0; padding: 0; height: 100%; overflow: hidden; }}
        #placeholder {{ width: 100%; height: 100%; }}
    </style>
</head>
<body>
    <div id="placeholder"></div>
    <script type="text/javascript">
        var config = {config};
        function onRequestClose() {{
            docEditor.destroyEditor();
            document.getElementById("placeholder").innerHTML =
            "<div style='text-align:center;padding-top:40px;font-size:20px;color:#666;'>文档已关闭</div>";
        }}
        config.events = {{ onRequestClose: onRequestClose }};
        var docEditor = new DocsAPI.DocEditor("placeholder", config);
    </script>
</body>
</html>"#
    )
}

#[derive(Debug, Deserialize)]
pub struct SaveCallback {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

/// `POST /onlyoffice/callback` — persist saves (status 2 and 6), ignore the
/// rest. The editor treats `{"error":0}` as the only success shape.
pub async fn save_callback(
    State(state): State<AppState>,
    Json(callback): Json<SaveCallback>,
) -> Response {
    if callback.status != 2 && callback.status != 6 {
        return Json(json!({ "error": 0 })).into_response();
    }
    let (Some(url), Some(key)) = (callback.url, callback.key) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": 1, "message": "Missing download URL or file key" })),
        )
            .into_response();
    };
    let Some(rel_path) = state.sessions.get_editing_file(&key) else {
        warn!(key = %key, "save callback for unknown edit key");
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": 1, "message": "File key not found or expired" })),
        )
            .into_response();
    };

    let content = match state
        .http
        .get(&url)
        .timeout(std::time::Duration::from_secs(30))
        .send()
        .await
        .and_then(|r| r.error_for_status())
    {
        Ok(response) => match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => return save_failure(format!("Failed to read document body: {e}")),
        },
        Err(e) => return save_failure(format!("Failed to download file from editor: {e}")),
    };

    match state.projects_fs.save_bytes(content, &rel_path).await {
        Ok(path) => {
            info!(path = %path.display(), "edited document saved");
            // reflect the save in the index right away
            let abs = state.index.absolute(DocType::Project, &rel_path);
            if let Err(e) = state.index.upsert_path(&abs).await {
                warn!(error = %e, "post-save index upsert failed");
            }
            Json(json!({ "error": 0 })).into_response()
        }
        Err(e) => save_failure(format!("An unexpected error occurred during save: {e}")),
    }
}

fn save_failure(message: String) -> Response {
    warn!(%message, "editor save failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": 1, "message": message })),
    )
        .into_response()
}

#[cfg(test)]
#[path = "editor_tests.rs"]
mod tests;
