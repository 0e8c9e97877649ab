//! Sign-up, sign-in and own-profile endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use marketplace_core::{Profile, UserId};

use super::session::{
    clear_session_cookie, current_identity, session_id_from_cookies, set_session_cookie,
};
use super::Success;
use crate::engine::{ProfileEdit, SignUp};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{RecordStore, SessionStore};

#[derive(Serialize)]
pub struct SignedIn {
    pub success: bool,
    pub user_id: UserId,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Own profile plus a freshly evaluated entitlement
#[derive(Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: Profile,
    pub is_verified: bool,
    pub contact_access: bool,
}

/// POST /api/sign_up
pub async fn sign_up<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Json(req): Json<SignUp>,
) -> Result<Json<SignedIn>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let (profile, session) = state.sign_up(req)?;
    set_session_cookie(&cookies, &session.id);
    Ok(Json(SignedIn {
        success: true,
        user_id: profile.id,
    }))
}

/// POST /api/sign_in
pub async fn sign_in<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SignedIn>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let session = state.sign_in(&req.email, &req.password)?;
    set_session_cookie(&cookies, &session.id);
    tracing::debug!(user_id = %session.user_id, "Signed in");
    Ok(Json(SignedIn {
        success: true,
        user_id: session.user_id,
    }))
}

/// POST /api/sign_out
pub async fn sign_out<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
) -> Result<Json<Success>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    if let Some(session_id) = session_id_from_cookies(&cookies) {
        state.sign_out(&session_id)?;
    }
    clear_session_cookie(&cookies);
    Ok(Json(Success::ok()))
}

/// GET /api/profile
pub async fn get_profile<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
) -> Result<Json<ProfileResponse>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = current_identity(&state, &cookies)?;
    let profile = state.my_profile(identity.as_ref())?;
    Ok(Json(ProfileResponse {
        is_verified: profile.is_verified(),
        contact_access: state.contact_entitlement(identity.as_ref()),
        profile,
    }))
}

/// POST /api/profile
pub async fn update_profile<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Json(edit): Json<ProfileEdit>,
) -> Result<Json<Profile>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = current_identity(&state, &cookies)?;
    Ok(Json(state.update_own_profile(identity.as_ref(), edit)?))
}
