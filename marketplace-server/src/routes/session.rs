//! Session cookie handling

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tower_cookies::{Cookie, Cookies};

use marketplace_core::{Error, SessionIdentity, UserId};

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{RecordStore, SessionId, SessionStore};

pub const SESSION_COOKIE: &str = "marketplace_session";

#[derive(Serialize)]
pub struct SessionContext {
    pub authenticated: bool,
    pub user_id: Option<UserId>,
    pub server_time: i64,
}

/// GET /api/session
pub async fn get_session_context<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
) -> Result<Json<SessionContext>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = current_identity(&state, &cookies)?;
    Ok(Json(SessionContext {
        authenticated: identity.is_some(),
        user_id: identity.map(|i| i.user_id),
        server_time: chrono::Utc::now().timestamp(),
    }))
}

pub fn session_id_from_cookies(cookies: &Cookies) -> Option<SessionId> {
    cookies
        .get(SESSION_COOKIE)
        .map(|c| SessionId(c.value().to_string()))
}

/// Identity behind the request's cookie, if it maps to a live session
pub fn current_identity<R, S>(
    state: &AppState<R, S>,
    cookies: &Cookies,
) -> Result<Option<SessionIdentity>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    match session_id_from_cookies(cookies) {
        Some(id) => Ok(state.get_session(&id)?),
        None => Ok(None),
    }
}

/// Like [`current_identity`] but signed-out callers are an error
pub fn require_identity<R, S>(
    state: &AppState<R, S>,
    cookies: &Cookies,
) -> Result<SessionIdentity, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    current_identity(state, cookies)?.ok_or(ApiError(Error::AuthenticationRequired))
}

pub fn set_session_cookie(cookies: &Cookies, session_id: &SessionId) {
    let cookie = Cookie::build((SESSION_COOKIE, session_id.0.clone()))
        .path("/")
        .http_only(true)
        .build();
    cookies.add(cookie);
}

pub fn clear_session_cookie(cookies: &Cookies) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(tower_cookies::cookie::time::Duration::ZERO)
        .build();
    cookies.add(cookie);
}
