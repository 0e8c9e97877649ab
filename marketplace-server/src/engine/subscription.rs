use chrono::Utc;

use marketplace_core::subscription::expiry_for;
use marketplace_core::{Error, Profile, Result, SessionIdentity, SubscriptionPlan, UserId};

use super::require_session;
use crate::state::AppState;
use crate::store::{ProfilePatch, RecordStore, SessionStore, Write};

impl<R: RecordStore, S: SessionStore> AppState<R, S> {
    /// Switch the owner's plan. Expiry is always recomputed from now, so a
    /// second subscription overwrites rather than extends.
    pub fn subscribe_to_plan(
        &self,
        caller: Option<&SessionIdentity>,
        user_id: UserId,
        plan: SubscriptionPlan,
    ) -> Result<Profile> {
        let caller_id = require_session(caller)?;
        if caller_id != user_id {
            return Err(Error::denied("only the account owner may change its plan"));
        }

        let now = Utc::now();
        let expiry = expiry_for(plan, now);
        self.commit(vec![Write::UpdateProfile {
            user_id,
            expect: None,
            patch: ProfilePatch::subscription(plan, expiry),
        }])?;

        tracing::info!(user_id = %user_id, plan = plan.as_str(), ?expiry, "Plan changed");
        self.read_profile(user_id)
    }
}
