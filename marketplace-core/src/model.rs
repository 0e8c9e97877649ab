//! Records the engine reasons about

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

record_id!(
    /// Stable account identifier, shared by credentials and profile
    UserId
);
record_id!(RequestId);
record_id!(ServiceId);
record_id!(NotificationId);
record_id!(AuditId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Seeker,
    Provider,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Seeker => "seeker",
            Role::Provider => "provider",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "seeker" => Some(Role::Seeker),
            "provider" => Some(Role::Provider),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Identity-verification state as recorded on the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    NotVerified,
    Pending,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::NotVerified => "not_verified",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_verified" => Some(VerificationStatus::NotVerified),
            "pending" => Some(VerificationStatus::Pending),
            "verified" => Some(VerificationStatus::Verified),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }
}

/// Disposition of a single verification request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Verified,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Verified => "verified",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "verified" => Some(RequestStatus::Verified),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Free,
    Monthly,
    SemiAnnual,
    Yearly,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Monthly => "monthly",
            SubscriptionPlan::SemiAnnual => "semi_annual",
            SubscriptionPlan::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(SubscriptionPlan::Free),
            "monthly" => Some(SubscriptionPlan::Monthly),
            "semi_annual" => Some(SubscriptionPlan::SemiAnnual),
            "yearly" => Some(SubscriptionPlan::Yearly),
            _ => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionPlan::Free)
    }
}

/// The authenticated identity behind a request, as reported by the identity store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: UserId,
}

/// One row per account.
///
/// `is_verified` is not stored: it is a projection of `verification_status`.
/// `can_access_contact` is a cache refreshed on every write and must never be
/// consulted for a disclosure decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub role: Role,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub verification_status: VerificationStatus,
    pub subscription_plan: SubscriptionPlan,
    pub subscription_expiry: Option<DateTime<Utc>>,
    pub can_access_contact: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh profile as created at sign-up
    pub fn new(id: UserId, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id,
            role,
            full_name: None,
            phone: None,
            address: None,
            verification_status: VerificationStatus::NotVerified,
            subscription_plan: SubscriptionPlan::Free,
            subscription_expiry: None,
            can_access_contact: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Recompute the cached entitlement flag as of `now`
    pub fn refresh_contact_cache(&mut self, now: DateTime<Utc>) {
        let owner = SessionIdentity { user_id: self.id };
        self.can_access_contact = crate::entitlement::can_access_contact(Some(&owner), Some(self), now);
    }
}

/// Admin disposition attached to a request. Present exactly when the request
/// status is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub reviewed_by: UserId,
    pub notes: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub status: RequestStatus,
    pub full_name: String,
    pub phone: String,
    pub additional_info: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub review: Option<Review>,
}

/// Private contact fields of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceListing {
    pub id: ServiceId,
    pub owner: UserId,
    pub title: String,
    pub category: String,
    pub description: Option<String>,
    pub is_active: bool,
    /// `None` when redacted for the caller
    pub contact: Option<ContactInfo>,
    pub created_at: DateTime<Utc>,
}

impl ServiceListing {
    /// Copy without the private contact fields
    pub fn redacted(&self) -> Self {
        Self {
            contact: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    VerificationApproved,
    VerificationRejected,
    VerificationRevoked,
    RoleChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::VerificationApproved => "verification_approved",
            NotificationKind::VerificationRejected => "verification_rejected",
            NotificationKind::VerificationRevoked => "verification_revoked",
            NotificationKind::RoleChanged => "role_changed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "verification_approved" => Some(NotificationKind::VerificationApproved),
            "verification_rejected" => Some(NotificationKind::VerificationRejected),
            "verification_revoked" => Some(NotificationKind::VerificationRevoked),
            "role_changed" => Some(NotificationKind::RoleChanged),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            kind,
            message: message.into(),
            created_at: now,
            read: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    ChangeRole,
    Approve,
    Reject,
    Unverify,
    Delete,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::ChangeRole => "change_role",
            AdminAction::Approve => "approve",
            AdminAction::Reject => "reject",
            AdminAction::Unverify => "unverify",
            AdminAction::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "change_role" => Some(AdminAction::ChangeRole),
            "approve" => Some(AdminAction::Approve),
            "reject" => Some(AdminAction::Reject),
            "unverify" => Some(AdminAction::Unverify),
            "delete" => Some(AdminAction::Delete),
            _ => None,
        }
    }
}

/// Record of a privileged mutation. Outlives the target account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub actor: UserId,
    pub target: UserId,
    pub action: AdminAction,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor: UserId,
        target: UserId,
        action: AdminAction,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditId::new(),
            actor,
            target,
            action,
            reason,
            at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_strings_round_trip() {
        for status in [
            VerificationStatus::NotVerified,
            VerificationStatus::Pending,
            VerificationStatus::Verified,
            VerificationStatus::Rejected,
        ] {
            assert_eq!(VerificationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SubscriptionPlan::parse("semi_annual"), Some(SubscriptionPlan::SemiAnnual));
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn test_new_profile_defaults() {
        let now = Utc::now();
        let profile = Profile::new(UserId::new(), Role::Provider, now);

        assert_eq!(profile.verification_status, VerificationStatus::NotVerified);
        assert_eq!(profile.subscription_plan, SubscriptionPlan::Free);
        assert!(profile.subscription_expiry.is_none());
        assert!(!profile.is_verified());
        assert!(!profile.can_access_contact);
        assert_eq!(profile.created_at, profile.updated_at);
    }

    #[test]
    fn test_redacted_listing_drops_contact() {
        let listing = ServiceListing {
            id: ServiceId::new(),
            owner: UserId::new(),
            title: "Plumbing".to_string(),
            category: "home".to_string(),
            description: None,
            is_active: true,
            contact: Some(ContactInfo {
                phone: Some("555-0100".to_string()),
                email: None,
            }),
            created_at: Utc::now(),
        };

        let redacted = listing.redacted();
        assert!(redacted.contact.is_none());
        assert_eq!(redacted.title, listing.title);
    }

    #[test]
    fn test_ids_serialize_as_plain_uuid() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}
