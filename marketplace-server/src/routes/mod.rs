//! HTTP routes for the marketplace engine

mod account;
mod admin;
mod changes;
mod notifications;
mod services;
pub mod session;
mod subscription;
mod verification;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::store::{RecordStore, SessionStore};

/// Body of operations that return nothing else
#[derive(Serialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Create the router with all routes
pub fn create_router<R, S>(state: Arc<AppState<R, S>>) -> Router
where
    R: RecordStore + 'static,
    S: SessionStore + 'static,
{
    Router::new()
        .route("/api/session", get(session::get_session_context))
        .route("/api/sign_up", post(account::sign_up))
        .route("/api/sign_in", post(account::sign_in))
        .route("/api/sign_out", post(account::sign_out))
        .route("/api/profile", get(account::get_profile).post(account::update_profile))
        .route("/api/verification", get(verification::latest).post(verification::submit))
        .route("/api/subscription", post(subscription::subscribe))
        .route("/api/services", get(services::list).post(services::create))
        .route("/api/services/:id/contact", get(services::contact))
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        .route("/api/admin/profiles", get(admin::list_profiles))
        .route("/api/admin/verifications", get(admin::list_verifications))
        .route("/api/admin/verifications/:id/review", post(admin::review))
        .route("/api/admin/users/:id/verify", post(admin::verify))
        .route("/api/admin/users/:id/reject", post(admin::reject))
        .route("/api/admin/users/:id/unverify", post(admin::unverify))
        .route("/api/admin/users/:id/role", post(admin::change_role))
        .route("/api/admin/users/:id/delete", post(admin::delete_user))
        .route("/api/admin/audit", get(admin::audit))
        .route("/api/changes", get(changes::stream))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
