//! Per-caller view of the change feed

use std::sync::Arc;

use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use marketplace_core::{Result, SessionIdentity, UserId};

use super::require_session;
use crate::feed::FeedMessage;
use crate::state::AppState;
use crate::store::{ChangeEvent, RecordStore, SessionStore, Table};

/// Which events one caller may see. Admins see every row, everyone else
/// their own rows plus listings.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChangeScope {
    user_id: UserId,
    table: Option<Table>,
    is_admin: bool,
}

impl ChangeScope {
    fn admits(&self, change: &ChangeEvent) -> bool {
        if self.table.is_some_and(|t| t != change.table) {
            return false;
        }
        self.is_admin || change.table == Table::Services || change.user_id == self.user_id
    }

    /// Re-read the caller's role after their own profile changed
    fn refresh<R: RecordStore>(&mut self, store: &R) {
        let is_admin = match store.read_profile(self.user_id) {
            Ok(profile) => profile.is_some_and(|p| p.is_admin()),
            Err(err) => {
                tracing::warn!(user_id = %self.user_id, error = %err, "Role re-check failed");
                false
            }
        };
        if is_admin != self.is_admin {
            tracing::info!(user_id = %self.user_id, is_admin, "Change stream scope updated");
        }
        self.is_admin = is_admin;
    }
}

impl<R: RecordStore + 'static, S: SessionStore> AppState<R, S> {
    /// Stream of feed messages visible to `caller`, optionally for one table.
    ///
    /// The caller's role is checked when the stream opens and again whenever
    /// their own profile changes, so a demoted admin stops seeing other
    /// accounts' rows from the next event on.
    pub fn watch_changes(
        &self,
        caller: Option<&SessionIdentity>,
        table: Option<Table>,
    ) -> Result<impl Stream<Item = FeedMessage> + Send + 'static> {
        let user_id = require_session(caller)?;
        let profile = self.read_profile(user_id)?;
        let mut scope = ChangeScope {
            user_id,
            table,
            is_admin: profile.is_admin(),
        };
        tracing::debug!(user_id = %user_id, ?scope, "Change stream opened");

        let store = Arc::clone(&self.store);
        let stream = BroadcastStream::new(self.feed.receiver()).filter_map(move |item| match item {
            Ok(change) => {
                if change.table == Table::Profiles && change.user_id == scope.user_id {
                    scope.refresh(store.as_ref());
                }
                scope.admits(&change).then_some(FeedMessage::Change(change))
            }
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::warn!(user_id = %scope.user_id, missed, "Change stream lagged");
                Some(FeedMessage::Resync { missed })
            }
        });
        Ok(stream)
    }
}
