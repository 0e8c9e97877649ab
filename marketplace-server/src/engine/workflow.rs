//! Verification workflow operations

use chrono::Utc;

use marketplace_core::verification::{self, SUBMITTABLE};
use marketplace_core::{
    AdminAction, AuditEntry, Decision, Error, Notification, NotificationKind, RequestId,
    Result, SessionIdentity, SubmissionFields, UserId, VerificationRequest, VerificationStatus,
};

use super::require_session;
use crate::state::AppState;
use crate::store::{ProfilePatch, RecordStore, SessionStore, Write};

impl<R: RecordStore, S: SessionStore> AppState<R, S> {
    /// Owner submits identity details for review.
    ///
    /// The profile moves to `pending` in the same batch as the request insert.
    pub fn submit_verification(
        &self,
        caller: Option<&SessionIdentity>,
        user_id: UserId,
        fields: SubmissionFields,
    ) -> Result<VerificationRequest> {
        let caller_id = require_session(caller)?;
        if caller_id != user_id {
            return Err(Error::denied("only the account owner may submit verification"));
        }

        let now = Utc::now();
        let request = verification::new_request(user_id, fields, now)?;

        let profile = self.read_profile(user_id)?;
        verification::check_can_submit(profile.verification_status)?;

        self.commit(vec![
            Write::UpdateProfile {
                user_id,
                expect: Some(SUBMITTABLE.to_vec()),
                patch: ProfilePatch::verification(VerificationStatus::Pending),
            },
            Write::InsertRequest(request.clone()),
        ])?;

        tracing::info!(user_id = %user_id, request_id = %request.id, "Verification submitted");
        Ok(request)
    }

    /// Latest verification request of the caller, if any
    pub fn my_verification(
        &self,
        caller: Option<&SessionIdentity>,
    ) -> Result<Option<VerificationRequest>> {
        let user_id = require_session(caller)?;
        Ok(self.store.requests_for_user(user_id)?.pop())
    }

    /// Approve or reject a pending request.
    ///
    /// Request status, profile status, the owner's notification and the audit
    /// row commit together. Losing a race to another reviewer yields
    /// `ConflictOrStale` and writes nothing.
    pub fn review_verification(
        &self,
        admin_id: UserId,
        request_id: RequestId,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<()> {
        self.require_admin(admin_id)?;

        let request = self
            .store
            .get_verification_request(request_id)?
            .ok_or_else(|| Error::not_found(format!("verification request {request_id}")))?;

        let now = Utc::now();
        let (status, review) = verification::review(&request, decision, admin_id, notes, now)?;

        let (kind, message) = match decision {
            Decision::Approve => (
                NotificationKind::VerificationApproved,
                "Your identity verification was approved".to_string(),
            ),
            Decision::Reject => (
                NotificationKind::VerificationRejected,
                match &review.notes {
                    Some(notes) => format!("Your identity verification was rejected: {notes}"),
                    None => "Your identity verification was rejected".to_string(),
                },
            ),
        };
        let action = match decision {
            Decision::Approve => AdminAction::Approve,
            Decision::Reject => AdminAction::Reject,
        };

        self.commit(vec![
            Write::ReviewRequest {
                id: request_id,
                status,
                review: review.clone(),
            },
            Write::UpdateProfile {
                user_id: request.user_id,
                expect: Some(vec![VerificationStatus::Pending]),
                patch: ProfilePatch::verification(decision.profile_status()),
            },
            Write::InsertNotification(Notification::new(request.user_id, kind, message, now)),
            Write::InsertAudit(AuditEntry::new(
                admin_id,
                request.user_id,
                action,
                review.notes,
                now,
            )),
        ])?;

        tracing::info!(
            admin = %admin_id,
            user_id = %request.user_id,
            request_id = %request_id,
            status = status.as_str(),
            "Verification reviewed"
        );
        Ok(())
    }

    /// Revoke a verified status. The reason is mandatory and is delivered to
    /// the owner as a notification.
    pub fn unverify_user(&self, admin_id: UserId, user_id: UserId, reason: &str) -> Result<()> {
        self.require_admin(admin_id)?;
        let reason = verification::require_reason(reason)?;

        let profile = self.read_profile(user_id)?;
        if profile.verification_status != VerificationStatus::Verified {
            return Err(Error::conflict(format!(
                "account is {}, not verified",
                profile.verification_status.as_str()
            )));
        }

        let now = Utc::now();
        self.commit(vec![
            Write::UpdateProfile {
                user_id,
                expect: Some(vec![VerificationStatus::Verified]),
                patch: ProfilePatch::verification(VerificationStatus::NotVerified),
            },
            Write::InsertNotification(Notification::new(
                user_id,
                NotificationKind::VerificationRevoked,
                format!("Your verification was revoked: {reason}"),
                now,
            )),
            Write::InsertAudit(AuditEntry::new(
                admin_id,
                user_id,
                AdminAction::Unverify,
                Some(reason),
                now,
            )),
        ])?;

        tracing::info!(admin = %admin_id, user_id = %user_id, "Verification revoked");
        Ok(())
    }
}
