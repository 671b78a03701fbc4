// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cookie-session authentication.
//!
//! The session cookie is `user.session_id.signature` where the signature is
//! HMAC-SHA-256 over `user.session_id` with the server secret. Possession of
//! a validly signed cookie is the weak check; the strict check additionally
//! consults the SessionManager (existence, id match, idle window) and stamps
//! HTTP activity.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dd_session::{SessionManager, SessionValidation};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

pub const COOKIE_NAME: &str = "dd_session";

type HmacSha256 = Hmac<Sha256>;

/// Signed contents of the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub username: String,
    pub session_id: String,
}

impl SessionCookie {
    /// Serialize and sign for Set-Cookie.
    pub fn encode(&self, secret: &str) -> String {
        let body = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&self.username),
            self.session_id
        );
        format!("{body}.{}", sign(secret, &body))
    }

    /// Parse and verify a cookie value; `None` on any tampering.
    pub fn decode(secret: &str, value: &str) -> Option<Self> {
        let (body, signature) = value.rsplit_once('.')?;
        if !constant_time_eq(&sign(secret, body), signature) {
            return None;
        }
        let (user_b64, session_id) = body.split_once('.')?;
        let username = URL_SAFE_NO_PAD
            .decode(user_b64)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())?;
        Some(Self { username, session_id: session_id.to_string() })
    }
}

fn sign(secret: &str, body: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body.as_bytes());
    let digest = mac.finalize().into_bytes();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Outcome of the strict verification used by authenticated routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCheck {
    Verified(String),
    /// 401 with a "session conflict" body.
    Conflict,
    /// Plain 401.
    Denied,
}

/// Weak check: a validly signed cookie names the user.
pub fn current_user(secret: &str, cookie_value: Option<&str>) -> Option<SessionCookie> {
    SessionCookie::decode(secret, cookie_value?)
}

/// Strict check per request: signature, liveness, session-id match and the
/// idle window. Stamps activity on success; logs the user out on expiry.
pub fn verify_active_session(
    secret: &str,
    sessions: &SessionManager,
    cookie_value: Option<&str>,
) -> AuthCheck {
    let Some(cookie) = current_user(secret, cookie_value) else {
        return AuthCheck::Denied;
    };
    match sessions.validate_session(&cookie.username, &cookie.session_id) {
        SessionValidation::Ok => {
            sessions.set_http_activity(&cookie.username);
            AuthCheck::Verified(cookie.username)
        }
        SessionValidation::Conflict => {
            warn!(user = %cookie.username, "session conflict");
            AuthCheck::Conflict
        }
        SessionValidation::Expired => {
            debug!(user = %cookie.username, "session expired, logging out");
            let _ = sessions.logout(&cookie.username);
            AuthCheck::Denied
        }
        SessionValidation::Missing => AuthCheck::Denied,
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
