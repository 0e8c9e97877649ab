//! Storage abstractions for the engine

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::{InMemorySessionStore, InMemoryStore};
pub use models::*;
pub use sqlite::SqliteStore;

use marketplace_core::{
    AuditEntry, Error, Notification, Profile, RequestId, RequestStatus, Review, ServiceId,
    ServiceListing, UserId, VerificationRequest,
};

/// Result type for store operations
pub type StoreResult<T> = Result<T, Error>;

/// Trait for the relational records behind the engine.
///
/// Every mutation goes through [`RecordStore::apply`], which commits a whole
/// batch or nothing. Failed preconditions surface as `ConflictOrStale`,
/// backend faults as `TransientStoreFailure`.
pub trait RecordStore: Send + Sync {
    /// Atomically apply a batch and report what changed
    fn apply(&self, batch: Vec<Write>) -> StoreResult<Vec<ChangeEvent>>;

    /// Get credentials by email (case-insensitive)
    fn get_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    fn read_profile(&self, user_id: UserId) -> StoreResult<Option<Profile>>;

    fn list_profiles(&self) -> StoreResult<Vec<Profile>>;

    fn get_verification_request(&self, id: RequestId) -> StoreResult<Option<VerificationRequest>>;

    /// All requests of a user, oldest first
    fn requests_for_user(&self, user_id: UserId) -> StoreResult<Vec<VerificationRequest>>;

    /// Requests across all users, oldest first, optionally by status
    fn list_verification_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<VerificationRequest>>;

    fn get_service(&self, id: ServiceId) -> StoreResult<Option<ServiceListing>>;

    /// Listings, optionally restricted to one owner
    fn list_services(&self, owner: Option<UserId>) -> StoreResult<Vec<ServiceListing>>;

    /// Notifications of a user, newest first
    fn list_notifications(&self, user_id: UserId) -> StoreResult<Vec<Notification>>;

    /// Audit trail, oldest first
    fn list_audit(&self) -> StoreResult<Vec<AuditEntry>>;

    /// The pending request of a user, if any
    fn pending_request_for_user(&self, user_id: UserId) -> StoreResult<Option<VerificationRequest>> {
        Ok(self
            .requests_for_user(user_id)?
            .into_iter()
            .rev()
            .find(|r| r.status == RequestStatus::Pending))
    }

    /// Patch a single profile and return the stored result
    fn update_profile(&self, user_id: UserId, patch: ProfilePatch) -> StoreResult<Profile> {
        self.apply(vec![Write::UpdateProfile {
            user_id,
            expect: None,
            patch,
        }])?;
        self.read_profile(user_id)?
            .ok_or_else(|| Error::not_found(format!("profile {user_id}")))
    }

    fn insert_verification_request(
        &self,
        request: VerificationRequest,
    ) -> StoreResult<VerificationRequest> {
        self.apply(vec![Write::InsertRequest(request.clone())])?;
        Ok(request)
    }

    /// Conditionally review a pending request
    fn update_verification_request(
        &self,
        id: RequestId,
        status: RequestStatus,
        review: Review,
    ) -> StoreResult<VerificationRequest> {
        self.apply(vec![Write::ReviewRequest { id, status, review }])?;
        self.get_verification_request(id)?
            .ok_or_else(|| Error::not_found(format!("verification request {id}")))
    }

    fn delete_user_cascade(&self, user_id: UserId) -> StoreResult<()> {
        self.apply(vec![Write::DeleteUser(user_id)])?;
        Ok(())
    }
}

/// Trait for session storage
pub trait SessionStore: Send + Sync {
    /// Create a new session for a user
    fn create(&self, user_id: UserId) -> StoreResult<Session>;

    /// Get a session by ID
    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>>;

    /// Delete a session
    fn delete(&self, session_id: &SessionId) -> StoreResult<()>;

    /// Delete every session of a user
    fn delete_for_user(&self, user_id: UserId) -> StoreResult<u64>;
}
