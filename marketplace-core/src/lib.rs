//! Marketplace entitlement core
//!
//! Pure rules behind the service marketplace:
//! - who may see a provider's private contact details
//! - how identity verification moves between states
//! - how subscription plans expire
//!
//! Nothing here performs I/O; the server crate feeds these functions freshly
//! read records.

pub mod entitlement;
pub mod error;
pub mod model;
pub mod subscription;
pub mod verification;

pub use entitlement::{can_access_contact, can_access_contact_now};
pub use error::Error;
pub use model::{
    AdminAction, AuditEntry, AuditId, ContactInfo, Notification, NotificationId,
    NotificationKind, Profile, RequestId, RequestStatus, Review, Role, ServiceId,
    ServiceListing, SessionIdentity, SubscriptionPlan, UserId, VerificationRequest,
    VerificationStatus,
};
pub use verification::{Decision, SubmissionFields};

/// Result type for marketplace operations
pub type Result<T> = std::result::Result<T, Error>;
