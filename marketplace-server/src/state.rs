//! Engine application state

use std::sync::Arc;

use marketplace_core::UserId;

use crate::crypto::BCRYPT_COST;
use crate::feed::{ChangeFeed, DEFAULT_CAPACITY};
use crate::store::{RecordStore, SessionStore};

/// Everything a request needs. Holds no notion of a "current user": the
/// caller's identity is passed into each operation.
pub struct AppState<R: RecordStore, S: SessionStore> {
    /// Profiles, verification requests, listings, notifications, audit
    pub store: Arc<R>,
    pub session_store: Arc<S>,
    pub feed: ChangeFeed,
    /// Account that can never lose its role or be deleted
    pub protected_account: UserId,
    pub(crate) password_cost: u32,
}

impl<R: RecordStore, S: SessionStore> AppState<R, S> {
    pub fn new(store: R, session_store: S, protected_account: UserId) -> Self {
        Self::with_shared(
            Arc::new(store),
            Arc::new(session_store),
            protected_account,
            DEFAULT_CAPACITY,
        )
    }

    /// Build from stores that may also be used elsewhere (e.g. one SQLite
    /// database serving both records and sessions)
    pub fn with_shared(
        store: Arc<R>,
        session_store: Arc<S>,
        protected_account: UserId,
        feed_capacity: usize,
    ) -> Self {
        Self {
            store,
            session_store,
            feed: ChangeFeed::new(feed_capacity),
            protected_account,
            password_cost: BCRYPT_COST,
        }
    }

    /// Override the bcrypt cost (tests use the minimum)
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }
}
