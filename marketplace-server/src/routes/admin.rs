//! Admin endpoints
//!
//! The caller's admin role is never taken from the request: each handler
//! passes the session's user id and the engine re-reads that profile.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tower_cookies::Cookies;

use marketplace_core::{
    AuditEntry, Decision, Profile, RequestId, RequestStatus, Role, UserId, VerificationRequest,
};

use super::session::require_identity;
use super::Success;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{RecordStore, SessionStore};

#[derive(Deserialize)]
pub struct VerificationQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub decision: Decision,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize)]
pub struct RoleRequest {
    pub role: Role,
    #[serde(default)]
    pub reason: String,
}

/// GET /api/admin/profiles
pub async fn list_profiles<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
) -> Result<Json<Vec<Profile>>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let admin = require_identity(&state, &cookies)?;
    Ok(Json(state.list_profiles(admin.user_id)?))
}

/// GET /api/admin/verifications?status=pending
pub async fn list_verifications<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Query(query): Query<VerificationQuery>,
) -> Result<Json<Vec<VerificationRequest>>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let admin = require_identity(&state, &cookies)?;
    Ok(Json(
        state.list_verification_requests(admin.user_id, query.status)?,
    ))
}

/// POST /api/admin/verifications/:id/review
pub async fn review<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Path(id): Path<RequestId>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Success>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let admin = require_identity(&state, &cookies)?;
    state.review_verification(admin.user_id, id, req.decision, req.notes)?;
    Ok(Json(Success::ok()))
}

/// POST /api/admin/users/:id/verify
pub async fn verify<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Path(id): Path<UserId>,
) -> Result<Json<Success>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let admin = require_identity(&state, &cookies)?;
    state.verify_user(admin.user_id, id)?;
    Ok(Json(Success::ok()))
}

/// POST /api/admin/users/:id/reject
pub async fn reject<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Path(id): Path<UserId>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Success>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let admin = require_identity(&state, &cookies)?;
    state.reject_user(admin.user_id, id, req.notes)?;
    Ok(Json(Success::ok()))
}

/// POST /api/admin/users/:id/unverify
pub async fn unverify<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Path(id): Path<UserId>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Success>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let admin = require_identity(&state, &cookies)?;
    state.unverify_user(admin.user_id, id, &req.reason)?;
    Ok(Json(Success::ok()))
}

/// POST /api/admin/users/:id/role
pub async fn change_role<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Path(id): Path<UserId>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<Success>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let admin = require_identity(&state, &cookies)?;
    state.change_user_role(admin.user_id, id, req.role, &req.reason)?;
    Ok(Json(Success::ok()))
}

/// POST /api/admin/users/:id/delete
pub async fn delete_user<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Path(id): Path<UserId>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Success>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let admin = require_identity(&state, &cookies)?;
    state.delete_user(admin.user_id, id, &req.reason)?;
    Ok(Json(Success::ok()))
}

/// GET /api/admin/audit
pub async fn audit<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
) -> Result<Json<Vec<AuditEntry>>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let admin = require_identity(&state, &cookies)?;
    Ok(Json(state.audit_log(admin.user_id)?))
}
