use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tower_cookies::Cookies;

use marketplace_core::{Profile, SubscriptionPlan};

use super::session::require_identity;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{RecordStore, SessionStore};

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub plan: SubscriptionPlan,
}

/// POST /api/subscription
pub async fn subscribe<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<Profile>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = require_identity(&state, &cookies)?;
    let profile = state.subscribe_to_plan(Some(&identity), identity.user_id, req.plan)?;
    Ok(Json(profile))
}
