//! Change feed over Server-Sent Events

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt};
use tower_cookies::Cookies;

use super::session::require_identity;
use crate::error::ApiError;
use crate::feed::FeedMessage;
use crate::state::AppState;
use crate::store::{RecordStore, SessionStore, Table};

#[derive(Deserialize)]
pub struct ChangesQuery {
    pub table: Option<Table>,
}

/// GET /api/changes?table=profiles
///
/// Emits `change` events carrying a [`crate::store::ChangeEvent`] and a
/// `resync` event when the client fell behind and must re-fetch.
/// Admins see every row; other callers see their own rows and all listings.
pub async fn stream<R, S>(
    State(state): State<Arc<AppState<R, S>>>,
    cookies: Cookies,
    Query(query): Query<ChangesQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError>
where
    R: RecordStore + 'static,
    S: SessionStore,
{
    let identity = require_identity(&state, &cookies)?;
    let changes = state.watch_changes(Some(&identity), query.table)?;

    let stream = changes.filter_map(|message| {
        let event = match message {
            FeedMessage::Change(change) => {
                Event::default().event("change").json_data(&change).ok()?
            }
            FeedMessage::Resync { missed } => {
                Event::default().event("resync").data(missed.to_string())
            }
        };
        Some(Ok(event))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
