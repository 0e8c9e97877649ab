//! Data models for engine storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketplace_core::{
    AuditEntry, Notification, NotificationId, Profile, RequestId, RequestStatus, Review, Role,
    ServiceListing, SessionIdentity, SubscriptionPlan, UserId, VerificationRequest,
    VerificationStatus,
};

/// Unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Sign-in credentials for an account
#[derive(Debug, Clone)]
pub struct Account {
    pub id: UserId,
    /// Stored lowercased
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A user session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            user_id: self.user_id,
        }
    }
}

/// Field-level profile update. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub role: Option<Role>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub verification_status: Option<VerificationStatus>,
    /// Plan and its expiry travel together
    pub subscription: Option<(SubscriptionPlan, Option<DateTime<Utc>>)>,
}

impl ProfilePatch {
    pub fn verification(status: VerificationStatus) -> Self {
        Self {
            verification_status: Some(status),
            ..Self::default()
        }
    }

    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    pub fn subscription(plan: SubscriptionPlan, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            subscription: Some((plan, expiry)),
            ..Self::default()
        }
    }

    /// Apply to a profile, bump `updated_at` and refresh the contact cache
    pub fn apply_to(&self, profile: &mut Profile, now: DateTime<Utc>) {
        if let Some(role) = self.role {
            profile.role = role;
        }
        if let Some(name) = &self.full_name {
            profile.full_name = Some(name.clone());
        }
        if let Some(phone) = &self.phone {
            profile.phone = Some(phone.clone());
        }
        if let Some(address) = &self.address {
            profile.address = Some(address.clone());
        }
        if let Some(status) = self.verification_status {
            profile.verification_status = status;
        }
        if let Some((plan, expiry)) = self.subscription {
            profile.subscription_plan = plan;
            profile.subscription_expiry = if plan.is_paid() { expiry } else { None };
        }
        profile.updated_at = now;
        profile.refresh_contact_cache(now);
    }
}

/// One write inside an atomic batch
#[derive(Debug, Clone)]
pub enum Write {
    /// Credentials and profile of a new account; fails on a duplicate email or id
    CreateAccount { account: Account, profile: Profile },

    /// Patch a profile. When `expect` is set, the current verification status
    /// must be one of the listed states.
    UpdateProfile {
        user_id: UserId,
        expect: Option<Vec<VerificationStatus>>,
        patch: ProfilePatch,
    },

    InsertRequest(VerificationRequest),

    /// Move a pending request to a terminal status. Fails unless the request
    /// is still pending.
    ReviewRequest {
        id: RequestId,
        status: RequestStatus,
        review: Review,
    },

    InsertService(ServiceListing),

    InsertNotification(Notification),

    MarkNotificationRead { id: NotificationId, user_id: UserId },

    InsertAudit(AuditEntry),

    /// Remove the account and everything it owns
    DeleteUser(UserId),
}

/// Tables visible on the change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    VerificationRequests,
    Services,
    Notifications,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Notice that a record changed. Carries identifiers only; subscribers
/// re-fetch the record itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Publication order, assigned by the feed; not a commit timestamp
    pub seq: u64,
    pub table: Table,
    pub op: ChangeOp,
    /// Primary key of the changed row
    pub key: String,
    /// Account the row belongs to
    pub user_id: UserId,
}

impl ChangeEvent {
    pub fn new(table: Table, op: ChangeOp, key: impl ToString, user_id: UserId) -> Self {
        Self {
            seq: 0,
            table,
            op,
            key: key.to_string(),
            user_id,
        }
    }
}
