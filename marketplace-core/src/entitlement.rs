//! Contact-disclosure entitlement
//!
//! A caller may see a provider's private contact fields only when all of the
//! following hold for the caller's own profile:
//! - there is an authenticated session for that profile
//! - the profile is verified
//! - the profile is on a paid plan
//! - the plan has not expired (expiry is checked lazily, here, at read time)
//!
//! Admins get no exemption here.

use chrono::{DateTime, Utc};

use crate::model::{Profile, SessionIdentity};
use crate::subscription;

/// Decide whether the session may see private contact details.
///
/// Never fails: any missing input yields `false`.
pub fn can_access_contact(
    session: Option<&SessionIdentity>,
    profile: Option<&Profile>,
    now: DateTime<Utc>,
) -> bool {
    let (Some(session), Some(profile)) = (session, profile) else {
        return false;
    };

    // A profile loaded for someone else says nothing about this caller
    if session.user_id != profile.id {
        return false;
    }

    profile.is_verified()
        && subscription::is_active(profile.subscription_plan, profile.subscription_expiry, now)
}

/// [`can_access_contact`] evaluated against the wall clock
pub fn can_access_contact_now(session: Option<&SessionIdentity>, profile: Option<&Profile>) -> bool {
    can_access_contact(session, profile, Utc::now())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::{Role, SubscriptionPlan, UserId, VerificationStatus};

    fn entitled_profile(now: DateTime<Utc>) -> Profile {
        let mut profile = Profile::new(UserId::new(), Role::Seeker, now);
        profile.verification_status = VerificationStatus::Verified;
        profile.subscription_plan = SubscriptionPlan::Monthly;
        profile.subscription_expiry = Some(now + Duration::days(30));
        profile
    }

    #[test]
    fn test_verified_paid_active_is_entitled() {
        let now = Utc::now();
        let profile = entitled_profile(now);
        let session = SessionIdentity { user_id: profile.id };

        assert!(can_access_contact(Some(&session), Some(&profile), now));
    }

    #[test]
    fn test_missing_session_or_profile() {
        let now = Utc::now();
        let profile = entitled_profile(now);
        let session = SessionIdentity { user_id: profile.id };

        assert!(!can_access_contact(None, Some(&profile), now));
        assert!(!can_access_contact(Some(&session), None, now));
    }

    #[test]
    fn test_session_for_other_user() {
        let now = Utc::now();
        let profile = entitled_profile(now);
        let stranger = SessionIdentity { user_id: UserId::new() };

        assert!(!can_access_contact(Some(&stranger), Some(&profile), now));
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let mut profile = entitled_profile(now);
        let session = SessionIdentity { user_id: profile.id };

        profile.subscription_expiry = Some(now);
        assert!(!can_access_contact(Some(&session), Some(&profile), now));

        profile.subscription_expiry = Some(now + Duration::seconds(1));
        assert!(can_access_contact(Some(&session), Some(&profile), now));
    }

    #[test]
    fn test_stale_cache_is_ignored() {
        let now = Utc::now();
        let mut profile = entitled_profile(now);
        let session = SessionIdentity { user_id: profile.id };

        profile.verification_status = VerificationStatus::NotVerified;
        profile.can_access_contact = true;
        assert!(!can_access_contact(Some(&session), Some(&profile), now));
    }

    #[test]
    fn test_admin_gets_no_exemption() {
        let now = Utc::now();
        let profile = Profile::new(UserId::new(), Role::Admin, now);
        let session = SessionIdentity { user_id: profile.id };

        assert!(!can_access_contact(Some(&session), Some(&profile), now));
    }
}
