//! Service listing endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use tower_cookies::Cookies;

use marketplace_core::{ContactInfo, ServiceId, ServiceListing};

use super::session::current_identity;
use crate::engine::NewService;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{RecordStore, SessionStore};

/// GET /api/services
pub async fn list<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
) -> Result<Json<Vec<ServiceListing>>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = current_identity(&state, &cookies)?;
    Ok(Json(state.list_public_services(identity.as_ref())?))
}

/// POST /api/services
pub async fn create<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Json(service): Json<NewService>,
) -> Result<Json<ServiceListing>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = current_identity(&state, &cookies)?;
    Ok(Json(state.create_service(identity.as_ref(), service)?))
}

/// GET /api/services/:id/contact
pub async fn contact<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Path(id): Path<ServiceId>,
) -> Result<Json<ContactInfo>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = current_identity(&state, &cookies)?;
    Ok(Json(state.service_contact(identity.as_ref(), id)?))
}
