//! Owner-side verification endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tower_cookies::Cookies;

use marketplace_core::{SubmissionFields, VerificationRequest};

use super::session::{current_identity, require_identity};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{RecordStore, SessionStore};

/// POST /api/verification
pub async fn submit<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Json(fields): Json<SubmissionFields>,
) -> Result<Json<VerificationRequest>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = require_identity(&state, &cookies)?;
    let request = state.submit_verification(Some(&identity), identity.user_id, fields)?;
    Ok(Json(request))
}

/// GET /api/verification
pub async fn latest<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
) -> Result<Json<Option<VerificationRequest>>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = current_identity(&state, &cookies)?;
    Ok(Json(state.my_verification(identity.as_ref())?))
}
