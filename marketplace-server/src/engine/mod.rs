//! Engine operations
//!
//! Every operation re-reads the records it decides on from the store, builds
//! one atomic batch, commits it, and only then publishes the resulting change
//! events. Nothing decided here trusts a client-held role or entitlement flag.

mod account;
mod admin;
mod changes;
mod listings;
mod subscription;
mod workflow;

pub use account::{ProfileEdit, SignUp};
pub use listings::NewService;

use marketplace_core::{Error, Profile, Result, SessionIdentity, UserId};

use crate::state::AppState;
use crate::store::{RecordStore, SessionStore, Write};

/// Identity of an authenticated caller
pub(crate) fn require_session(caller: Option<&SessionIdentity>) -> Result<UserId> {
    caller
        .map(|s| s.user_id)
        .ok_or(Error::AuthenticationRequired)
}

impl<R: RecordStore, S: SessionStore> AppState<R, S> {
    /// Apply a batch atomically, then announce it
    pub(crate) fn commit(&self, batch: Vec<Write>) -> Result<()> {
        let events = self.store.apply(batch)?;
        self.feed.publish(events);
        Ok(())
    }

    /// Authoritative read of a profile (the `readProfile` primitive)
    pub fn read_profile(&self, user_id: UserId) -> Result<Profile> {
        self.store
            .read_profile(user_id)?
            .ok_or_else(|| Error::not_found(format!("profile {user_id}")))
    }

    /// Fresh role check for privileged operations
    pub(crate) fn require_admin(&self, admin_id: UserId) -> Result<Profile> {
        let profile = self
            .store
            .read_profile(admin_id)?
            .ok_or_else(|| Error::denied("caller has no profile"))?;
        if !profile.is_admin() {
            tracing::warn!(caller = %admin_id, "Non-admin attempted an admin action");
            return Err(Error::denied("administrator role required"));
        }
        Ok(profile)
    }

    pub(crate) fn guard_protected(&self, target: UserId) -> Result<()> {
        if target == self.protected_account {
            return Err(Error::denied("the protected account cannot be modified"));
        }
        Ok(())
    }
}
