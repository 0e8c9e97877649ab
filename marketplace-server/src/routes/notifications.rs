use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use tower_cookies::Cookies;

use marketplace_core::{Notification, NotificationId};

use super::session::current_identity;
use super::Success;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{RecordStore, SessionStore};

/// GET /api/notifications
pub async fn list<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
) -> Result<Json<Vec<Notification>>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = current_identity(&state, &cookies)?;
    Ok(Json(state.notifications(identity.as_ref())?))
}

/// POST /api/notifications/:id/read
pub async fn mark_read<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Path(id): Path<NotificationId>,
) -> Result<Json<Success>, ApiError>
where
    R: RecordStore,
    S: SessionStore,
{
    let identity = current_identity(&state, &cookies)?;
    state.mark_notification_read(identity.as_ref(), id)?;
    Ok(Json(Success::ok()))
}
