//! Client-side read-through cache of profile records
//!
//! A UI keeps one of these per client and feeds it every [`FeedMessage`] it
//! receives. The cache only ever drives display hints; disclosure decisions
//! are made server-side against a fresh read.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use marketplace_core::{can_access_contact, Profile, Result, SessionIdentity, UserId};

use crate::feed::FeedMessage;
use crate::store::{RecordStore, Table};

pub struct ProfileView<R: RecordStore> {
    store: Arc<R>,
    profiles: HashMap<UserId, Profile>,
}

impl<R: RecordStore> ProfileView<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self {
            store,
            profiles: HashMap::new(),
        }
    }

    /// Cached profile, fetched from the store on a miss
    pub fn get(&mut self, user_id: UserId) -> Result<Option<Profile>> {
        if let Some(profile) = self.profiles.get(&user_id) {
            return Ok(Some(profile.clone()));
        }
        let fetched = self.store.read_profile(user_id)?;
        if let Some(profile) = &fetched {
            self.profiles.insert(user_id, profile.clone());
        }
        Ok(fetched)
    }

    pub fn is_cached(&self, user_id: UserId) -> bool {
        self.profiles.contains_key(&user_id)
    }

    /// Invalidate whatever a feed message touched. Safe to call repeatedly
    /// with the same message.
    pub fn apply(&mut self, message: &FeedMessage) {
        match message {
            FeedMessage::Change(event) => {
                // Request reviews move the owner's status as well
                if matches!(event.table, Table::Profiles | Table::VerificationRequests) {
                    self.profiles.remove(&event.user_id);
                }
            }
            FeedMessage::Resync { missed } => {
                tracing::debug!(missed, cached = self.profiles.len(), "Dropping profile cache");
                self.profiles.clear();
            }
        }
    }

    /// Re-fetch every cached profile, e.g. when a view becomes active again
    pub fn refresh(&mut self) -> Result<()> {
        let ids: Vec<UserId> = self.profiles.keys().copied().collect();
        for id in ids {
            match self.store.read_profile(id)? {
                Some(profile) => {
                    self.profiles.insert(id, profile);
                }
                None => {
                    self.profiles.remove(&id);
                }
            }
        }
        Ok(())
    }

    /// Entitlement evaluated on cached data. A UI hint, never an authorization.
    pub fn contact_hint(&mut self, session: Option<&SessionIdentity>) -> bool {
        let Some(session) = session else {
            return false;
        };
        match self.get(session.user_id) {
            Ok(profile) => can_access_contact(Some(session), profile.as_ref(), Utc::now()),
            Err(_) => false,
        }
    }
}
