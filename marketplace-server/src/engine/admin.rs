//! Admin action surface
//!
//! Every action re-reads the caller's profile and refuses unless it is an
//! admin at that moment. Role changes and deletions never touch the protected
//! account, whoever asks.

use chrono::Utc;

use marketplace_core::verification::require_reason;
use marketplace_core::{
    AdminAction, AuditEntry, Decision, Error, Notification, NotificationKind, Profile,
    RequestStatus, Result, Role, UserId, VerificationRequest,
};

use crate::state::AppState;
use crate::store::{ProfilePatch, RecordStore, SessionStore, Write};

impl<R: RecordStore, S: SessionStore> AppState<R, S> {
    pub fn change_user_role(
        &self,
        admin_id: UserId,
        user_id: UserId,
        role: Role,
        reason: &str,
    ) -> Result<()> {
        self.guard_protected(user_id)?;
        self.require_admin(admin_id)?;
        let reason = require_reason(reason)?;
        let target = self.read_profile(user_id)?;

        let now = Utc::now();
        self.commit(vec![
            Write::UpdateProfile {
                user_id,
                expect: None,
                patch: ProfilePatch::role(role),
            },
            Write::InsertNotification(Notification::new(
                user_id,
                NotificationKind::RoleChanged,
                format!(
                    "Your role changed from {} to {}: {reason}",
                    target.role.as_str(),
                    role.as_str()
                ),
                now,
            )),
            Write::InsertAudit(AuditEntry::new(
                admin_id,
                user_id,
                AdminAction::ChangeRole,
                Some(reason),
                now,
            )),
        ])?;

        tracing::info!(
            admin = %admin_id,
            user_id = %user_id,
            from = target.role.as_str(),
            to = role.as_str(),
            "Role changed"
        );
        Ok(())
    }

    /// Approve the user's pending request
    pub fn verify_user(&self, admin_id: UserId, user_id: UserId) -> Result<()> {
        let request = self.pending_request_of(admin_id, user_id)?;
        self.review_verification(admin_id, request.id, Decision::Approve, None)
    }

    /// Reject the user's pending request
    pub fn reject_user(
        &self,
        admin_id: UserId,
        user_id: UserId,
        notes: Option<String>,
    ) -> Result<()> {
        let request = self.pending_request_of(admin_id, user_id)?;
        self.review_verification(admin_id, request.id, Decision::Reject, notes)
    }

    fn pending_request_of(&self, admin_id: UserId, user_id: UserId) -> Result<VerificationRequest> {
        self.require_admin(admin_id)?;
        self.store
            .pending_request_for_user(user_id)?
            .ok_or_else(|| Error::not_found(format!("pending verification request for {user_id}")))
    }

    /// Remove an account with its listings, requests and notifications in one
    /// batch. The audit row is written in that batch and outlives the account.
    pub fn delete_user(&self, admin_id: UserId, user_id: UserId, reason: &str) -> Result<()> {
        self.guard_protected(user_id)?;
        self.require_admin(admin_id)?;
        let reason = require_reason(reason)?;
        self.read_profile(user_id)?;

        let now = Utc::now();
        self.commit(vec![
            Write::InsertAudit(AuditEntry::new(
                admin_id,
                user_id,
                AdminAction::Delete,
                Some(reason),
                now,
            )),
            Write::DeleteUser(user_id),
        ])?;

        match self.session_store.delete_for_user(user_id) {
            Ok(count) => tracing::debug!(user_id = %user_id, count, "Sessions revoked"),
            Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Failed to revoke sessions"),
        }

        tracing::info!(admin = %admin_id, user_id = %user_id, "User deleted");
        Ok(())
    }

    pub fn list_profiles(&self, admin_id: UserId) -> Result<Vec<Profile>> {
        self.require_admin(admin_id)?;
        self.store.list_profiles()
    }

    pub fn list_verification_requests(
        &self,
        admin_id: UserId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<VerificationRequest>> {
        self.require_admin(admin_id)?;
        self.store.list_verification_requests(status)
    }

    pub fn audit_log(&self, admin_id: UserId) -> Result<Vec<AuditEntry>> {
        self.require_admin(admin_id)?;
        self.store.list_audit()
    }
}
