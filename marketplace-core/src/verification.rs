//! Identity-verification state machine
//!
//! ```text
//! not_verified ──submit──▶ pending ──approve──▶ verified
//!      ▲                     │                     │
//!      │                     └──reject──▶ rejected │
//!      │                                   │       │
//!      │            submit (resubmission)◀─┘       │
//!      └───────────────────unverify────────────────┘
//! ```
//!
//! A new submission is refused while one is pending or once verified; only
//! `not_verified` and `rejected` may submit. This keeps at most one pending
//! request per user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    RequestId, RequestStatus, Review, UserId, VerificationRequest, VerificationStatus,
};
use crate::Result;

/// Profile states from which a new request may be submitted
pub const SUBMITTABLE: &[VerificationStatus] =
    &[VerificationStatus::NotVerified, VerificationStatus::Rejected];

/// Admin verdict on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn request_status(&self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Verified,
            Decision::Reject => RequestStatus::Rejected,
        }
    }

    pub fn profile_status(&self) -> VerificationStatus {
        match self {
            Decision::Approve => VerificationStatus::Verified,
            Decision::Reject => VerificationStatus::Rejected,
        }
    }
}

impl VerificationStatus {
    /// Whether the state machine has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: VerificationStatus) -> bool {
        use VerificationStatus::*;
        matches!(
            (self, next),
            (NotVerified, Pending)
                | (Rejected, Pending)
                | (Pending, Verified)
                | (Pending, Rejected)
                | (Verified, NotVerified)
        )
    }
}

/// Identity fields supplied with a submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFields {
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub additional_info: Option<String>,
}

/// Check that the profile state allows a new submission
pub fn check_can_submit(current: VerificationStatus) -> Result<()> {
    match current {
        VerificationStatus::NotVerified | VerificationStatus::Rejected => Ok(()),
        VerificationStatus::Pending => Err(Error::conflict(
            "a verification request is already pending review",
        )),
        VerificationStatus::Verified => Err(Error::conflict("account is already verified")),
    }
}

/// Validate submission fields and build the pending request row
pub fn new_request(
    user_id: UserId,
    fields: SubmissionFields,
    now: DateTime<Utc>,
) -> Result<VerificationRequest> {
    let full_name = required(&fields.full_name, "full name")?;
    let phone = required(&fields.phone, "phone number")?;
    let additional_info = fields
        .additional_info
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(VerificationRequest {
        id: RequestId::new(),
        user_id,
        status: RequestStatus::Pending,
        full_name,
        phone,
        additional_info,
        submitted_at: now,
        review: None,
    })
}

/// Decide a pending request.
///
/// Returns the terminal status and the review that must be written with it.
/// A request that is already terminal yields `ConflictOrStale`.
pub fn review(
    request: &VerificationRequest,
    decision: Decision,
    admin: UserId,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<(RequestStatus, Review)> {
    if request.status.is_terminal() {
        return Err(Error::conflict(format!(
            "request {} was already {}",
            request.id,
            request.status.as_str()
        )));
    }

    let review = Review {
        reviewed_by: admin,
        notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        reviewed_at: now,
    };
    Ok((decision.request_status(), review))
}

/// Check a mandatory reason string and return it trimmed
pub fn require_reason(reason: &str) -> Result<String> {
    required(reason, "reason")
}

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> SubmissionFields {
        SubmissionFields {
            full_name: "  Ada Lovelace ".to_string(),
            phone: "555-0100".to_string(),
            additional_info: Some("   ".to_string()),
        }
    }

    #[test]
    fn test_transition_table() {
        use VerificationStatus::*;

        assert!(NotVerified.can_transition_to(Pending));
        assert!(Rejected.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Verified));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Verified.can_transition_to(NotVerified));

        assert!(!Pending.can_transition_to(Pending));
        assert!(!Verified.can_transition_to(Pending));
        assert!(!NotVerified.can_transition_to(Verified));
        assert!(!Rejected.can_transition_to(Verified));
    }

    #[test]
    fn test_submittable_states_match_transitions() {
        for status in SUBMITTABLE {
            assert!(status.can_transition_to(VerificationStatus::Pending));
            assert!(check_can_submit(*status).is_ok());
        }
    }

    #[test]
    fn test_pending_and_verified_cannot_submit() {
        assert!(matches!(
            check_can_submit(VerificationStatus::Pending),
            Err(Error::ConflictOrStale(_))
        ));
        assert!(matches!(
            check_can_submit(VerificationStatus::Verified),
            Err(Error::ConflictOrStale(_))
        ));
    }

    #[test]
    fn test_new_request_trims_fields() {
        let request = new_request(UserId::new(), fields(), Utc::now()).unwrap();

        assert_eq!(request.full_name, "Ada Lovelace");
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.additional_info.is_none());
        assert!(request.review.is_none());
    }

    #[test]
    fn test_new_request_requires_identity_fields() {
        let mut missing_name = fields();
        missing_name.full_name = " ".to_string();
        assert!(matches!(
            new_request(UserId::new(), missing_name, Utc::now()),
            Err(Error::ValidationFailed(_))
        ));

        let mut missing_phone = fields();
        missing_phone.phone = String::new();
        assert!(matches!(
            new_request(UserId::new(), missing_phone, Utc::now()),
            Err(Error::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_review_sets_reviewer_with_status() {
        let request = new_request(UserId::new(), fields(), Utc::now()).unwrap();
        let admin = UserId::new();

        let (status, review) =
            review(&request, Decision::Reject, admin, Some("blurry scan".into()), Utc::now())
                .unwrap();

        assert_eq!(status, RequestStatus::Rejected);
        assert_eq!(review.reviewed_by, admin);
        assert_eq!(review.notes.as_deref(), Some("blurry scan"));
    }

    #[test]
    fn test_review_of_terminal_request_conflicts() {
        let mut request = new_request(UserId::new(), fields(), Utc::now()).unwrap();
        request.status = RequestStatus::Verified;

        let result = review(&request, Decision::Approve, UserId::new(), None, Utc::now());
        assert!(matches!(result, Err(Error::ConflictOrStale(_))));
    }

    #[test]
    fn test_reason_must_not_be_blank() {
        assert!(require_reason(" \t ").is_err());
        assert_eq!(require_reason(" fraud ").unwrap(), "fraud");
    }
}
