//! Session login and logout handlers.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::auth::session;
use crate::store::Value;

use super::super::{auth, error::ApiError, state::AppState};

/// JSON login body, used when no Basic header is present.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Verify credentials and set the signed session cookie.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<LoginRequest>>,
) -> Result<Response, ApiError> {
    let (username, password) = match auth::basic_credentials(&headers) {
        Some(credentials) => credentials,
        None => {
            let Json(request) = body.ok_or_else(|| ApiError::bad_request("missing credentials"))?;
            (request.username, request.password)
        }
    };

    let user = state.store().authenticate(&username, &password)?;
    let username = user
        .get("_id")
        .and_then(Value::as_text)
        .unwrap_or(&username);
    let token = session::sign(username)?;
    let cookie = format!(
        "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age=86400",
        auth::SESSION_COOKIE
    );
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

/// Clear the session cookie. Tokens themselves stay valid until they expire;
/// there is no server-side session table to revoke.
pub async fn logout() -> Response {
    let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0", auth::SESSION_COOKIE);
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response()
}
