//! Request credential resolution: session cookie first, then Basic auth.

use axum::http::{header, HeaderMap};
use data_encoding::BASE64;

use crate::auth::session;
use crate::store::Resource;

use super::state::AppState;

/// Name of the session cookie carrying the signed token.
pub const SESSION_COOKIE: &str = "session";

/// Resolve the acting user from request headers, if any. A valid session
/// cookie wins; otherwise Basic credentials are verified against `_users`.
pub fn resolve_user(state: &AppState, headers: &HeaderMap) -> Option<Resource> {
    if let Some(username) = session_user(headers) {
        if let Ok(Some(user)) = state.store().get("_users", &username) {
            return Some(user);
        }
    }
    let (username, password) = basic_credentials(headers)?;
    state.store().authenticate(&username, &password).ok()
}

fn session_user(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    let token = cookies.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })?;
    session::verify(&token).ok()
}

/// Decode an `Authorization: Basic` header into `(username, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.as_bytes()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
