//! In-memory storage implementations

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use marketplace_core::{
    AuditEntry, Error, Notification, NotificationId, Profile, RequestId, RequestStatus,
    ServiceId, ServiceListing, UserId, VerificationRequest,
};

use super::{
    Account, ChangeEvent, ChangeOp, RecordStore, Session, SessionId, SessionStore, StoreResult,
    Table, Write,
};

fn poisoned<T>(_: T) -> Error {
    Error::transient("in-memory store lock poisoned")
}

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: HashMap<UserId, Account>,
    emails: HashMap<String, UserId>,
    profiles: HashMap<UserId, Profile>,
    requests: HashMap<RequestId, VerificationRequest>,
    services: HashMap<ServiceId, ServiceListing>,
    notifications: HashMap<NotificationId, Notification>,
    audit: Vec<AuditEntry>,
}

impl Tables {
    fn require_account(&self, user_id: UserId) -> StoreResult<()> {
        if self.accounts.contains_key(&user_id) {
            Ok(())
        } else {
            Err(Error::not_found(format!("user {user_id}")))
        }
    }

    fn apply(
        &mut self,
        write: Write,
        now: DateTime<Utc>,
        events: &mut Vec<ChangeEvent>,
    ) -> StoreResult<()> {
        match write {
            Write::CreateAccount { account, profile } => {
                let email = account.email.to_lowercase();
                if self.emails.contains_key(&email) || self.accounts.contains_key(&account.id) {
                    return Err(Error::conflict("email already registered"));
                }
                let id = account.id;
                self.emails.insert(email.clone(), id);
                self.accounts.insert(id, Account { email, ..account });
                self.profiles.insert(id, profile);
                events.push(ChangeEvent::new(Table::Profiles, ChangeOp::Insert, id, id));
            }
            Write::UpdateProfile {
                user_id,
                expect,
                patch,
            } => {
                let profile = self
                    .profiles
                    .get_mut(&user_id)
                    .ok_or_else(|| Error::not_found(format!("profile {user_id}")))?;
                if let Some(allowed) = expect {
                    if !allowed.contains(&profile.verification_status) {
                        return Err(Error::conflict(format!(
                            "profile {user_id} is now {}",
                            profile.verification_status.as_str()
                        )));
                    }
                }
                patch.apply_to(profile, now);
                events.push(ChangeEvent::new(Table::Profiles, ChangeOp::Update, user_id, user_id));
            }
            Write::InsertRequest(request) => {
                self.require_account(request.user_id)?;
                let already_pending = self.requests.values().any(|r| {
                    r.user_id == request.user_id && r.status == RequestStatus::Pending
                });
                if already_pending {
                    return Err(Error::conflict(
                        "a verification request is already pending review",
                    ));
                }
                events.push(ChangeEvent::new(
                    Table::VerificationRequests,
                    ChangeOp::Insert,
                    request.id,
                    request.user_id,
                ));
                self.requests.insert(request.id, request);
            }
            Write::ReviewRequest { id, status, review } => {
                let request = self
                    .requests
                    .get_mut(&id)
                    .ok_or_else(|| Error::not_found(format!("verification request {id}")))?;
                if request.status != RequestStatus::Pending {
                    return Err(Error::conflict(format!(
                        "request {id} was already {}",
                        request.status.as_str()
                    )));
                }
                request.status = status;
                request.review = Some(review);
                events.push(ChangeEvent::new(
                    Table::VerificationRequests,
                    ChangeOp::Update,
                    id,
                    request.user_id,
                ));
            }
            Write::InsertService(service) => {
                self.require_account(service.owner)?;
                events.push(ChangeEvent::new(
                    Table::Services,
                    ChangeOp::Insert,
                    service.id,
                    service.owner,
                ));
                self.services.insert(service.id, service);
            }
            Write::InsertNotification(notification) => {
                self.require_account(notification.user_id)?;
                events.push(ChangeEvent::new(
                    Table::Notifications,
                    ChangeOp::Insert,
                    notification.id,
                    notification.user_id,
                ));
                self.notifications.insert(notification.id, notification);
            }
            Write::MarkNotificationRead { id, user_id } => {
                let notification = self
                    .notifications
                    .get_mut(&id)
                    .filter(|n| n.user_id == user_id)
                    .ok_or_else(|| Error::not_found(format!("notification {id}")))?;
                notification.read = true;
                events.push(ChangeEvent::new(Table::Notifications, ChangeOp::Update, id, user_id));
            }
            Write::InsertAudit(entry) => {
                self.audit.push(entry);
            }
            Write::DeleteUser(user_id) => {
                let account = self
                    .accounts
                    .remove(&user_id)
                    .ok_or_else(|| Error::not_found(format!("user {user_id}")))?;
                self.emails.remove(&account.email);

                let requests: Vec<RequestId> = self
                    .requests
                    .values()
                    .filter(|r| r.user_id == user_id)
                    .map(|r| r.id)
                    .collect();
                for id in requests {
                    self.requests.remove(&id);
                    events.push(ChangeEvent::new(
                        Table::VerificationRequests,
                        ChangeOp::Delete,
                        id,
                        user_id,
                    ));
                }

                let services: Vec<ServiceId> = self
                    .services
                    .values()
                    .filter(|s| s.owner == user_id)
                    .map(|s| s.id)
                    .collect();
                for id in services {
                    self.services.remove(&id);
                    events.push(ChangeEvent::new(Table::Services, ChangeOp::Delete, id, user_id));
                }

                let notifications: Vec<NotificationId> = self
                    .notifications
                    .values()
                    .filter(|n| n.user_id == user_id)
                    .map(|n| n.id)
                    .collect();
                for id in notifications {
                    self.notifications.remove(&id);
                    events.push(ChangeEvent::new(
                        Table::Notifications,
                        ChangeOp::Delete,
                        id,
                        user_id,
                    ));
                }

                self.profiles.remove(&user_id);
                events.push(ChangeEvent::new(Table::Profiles, ChangeOp::Delete, user_id, user_id));
            }
        }
        Ok(())
    }
}

/// In-memory record store.
///
/// A batch is applied to a scratch copy of the tables and swapped in only when
/// every write succeeded, so readers never observe half a batch.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_after: Mutex<Option<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            fail_after: Mutex::new(None),
        }
    }

    /// Make the next batch fail with a transient error after `writes` of its
    /// writes have been applied (for testing purposes)
    pub fn fail_after_writes(&self, writes: usize) {
        if let Ok(mut slot) = self.fail_after.lock() {
            *slot = Some(writes);
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryStore {
    fn apply(&self, batch: Vec<Write>) -> StoreResult<Vec<ChangeEvent>> {
        let fail_at = self.fail_after.lock().map_err(poisoned)?.take();
        let now = Utc::now();

        let mut tables = self.tables.write().map_err(poisoned)?;
        let mut scratch = tables.clone();
        let mut events = Vec::new();

        for (applied, write) in batch.into_iter().enumerate() {
            if fail_at == Some(applied) {
                return Err(Error::transient("injected store failure"));
            }
            scratch.apply(write, now, &mut events)?;
        }

        *tables = scratch;
        Ok(events)
    }

    fn get_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .emails
            .get(&email.to_lowercase())
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    fn read_profile(&self, user_id: UserId) -> StoreResult<Option<Profile>> {
        Ok(self.tables.read().map_err(poisoned)?.profiles.get(&user_id).cloned())
    }

    fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut profiles: Vec<Profile> = tables.profiles.values().cloned().collect();
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }

    fn get_verification_request(&self, id: RequestId) -> StoreResult<Option<VerificationRequest>> {
        Ok(self.tables.read().map_err(poisoned)?.requests.get(&id).cloned())
    }

    fn requests_for_user(&self, user_id: UserId) -> StoreResult<Vec<VerificationRequest>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut requests: Vec<VerificationRequest> = tables
            .requests
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.submitted_at);
        Ok(requests)
    }

    fn list_verification_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<VerificationRequest>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut requests: Vec<VerificationRequest> = tables
            .requests
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.submitted_at);
        Ok(requests)
    }

    fn get_service(&self, id: ServiceId) -> StoreResult<Option<ServiceListing>> {
        Ok(self.tables.read().map_err(poisoned)?.services.get(&id).cloned())
    }

    fn list_services(&self, owner: Option<UserId>) -> StoreResult<Vec<ServiceListing>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut services: Vec<ServiceListing> = tables
            .services
            .values()
            .filter(|s| owner.map_or(true, |o| s.owner == o))
            .cloned()
            .collect();
        services.sort_by_key(|s| s.created_at);
        Ok(services)
    }

    fn list_notifications(&self, user_id: UserId) -> StoreResult<Vec<Notification>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut notifications: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    fn list_audit(&self) -> StoreResult<Vec<AuditEntry>> {
        Ok(self.tables.read().map_err(poisoned)?.audit.clone())
    }
}

/// In-memory session store
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, user_id: UserId) -> StoreResult<Session> {
        let session = Session {
            id: SessionId(Uuid::new_v4().to_string()),
            user_id,
            created_at: Utc::now(),
        };
        self.sessions
            .write()
            .map_err(poisoned)?
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().map_err(poisoned)?.get(session_id).cloned())
    }

    fn delete(&self, session_id: &SessionId) -> StoreResult<()> {
        self.sessions.write().map_err(poisoned)?.remove(session_id);
        Ok(())
    }

    fn delete_for_user(&self, user_id: UserId) -> StoreResult<u64> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use marketplace_core::{Role, VerificationStatus};

    use super::*;
    use crate::store::ProfilePatch;

    fn create_account(store: &InMemoryStore, email: &str) -> UserId {
        let id = UserId::new();
        let now = Utc::now();
        store
            .apply(vec![Write::CreateAccount {
                account: Account {
                    id,
                    email: email.to_string(),
                    password_hash: "hashed_password".to_string(),
                    created_at: now,
                },
                profile: Profile::new(id, Role::Seeker, now),
            }])
            .unwrap();
        id
    }

    #[test]
    fn test_create_account_and_lookup() {
        let store = InMemoryStore::new();
        let id = create_account(&store, "Test@Example.com");

        let account = store.get_account_by_email("test@example.com").unwrap().unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.email, "test@example.com");
        assert!(store.read_profile(id).unwrap().is_some());
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let store = InMemoryStore::new();
        create_account(&store, "test@example.com");

        let id = UserId::new();
        let result = store.apply(vec![Write::CreateAccount {
            account: Account {
                id,
                email: "TEST@example.com".to_string(),
                password_hash: String::new(),
                created_at: Utc::now(),
            },
            profile: Profile::new(id, Role::Seeker, Utc::now()),
        }]);
        assert!(matches!(result, Err(Error::ConflictOrStale(_))));
    }

    #[test]
    fn test_failed_precondition_rolls_back_batch() {
        let store = InMemoryStore::new();
        let id = create_account(&store, "test@example.com");

        let result = store.apply(vec![
            Write::UpdateProfile {
                user_id: id,
                expect: None,
                patch: ProfilePatch::role(Role::Provider),
            },
            Write::UpdateProfile {
                user_id: id,
                expect: Some(vec![VerificationStatus::Verified]),
                patch: ProfilePatch::verification(VerificationStatus::NotVerified),
            },
        ]);

        assert!(matches!(result, Err(Error::ConflictOrStale(_))));
        assert_eq!(store.read_profile(id).unwrap().unwrap().role, Role::Seeker);
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let store = InMemoryStore::new();
        let id = create_account(&store, "test@example.com");

        store.fail_after_writes(0);
        let result = store.update_profile(id, ProfilePatch::role(Role::Provider));
        assert!(matches!(result, Err(Error::TransientStoreFailure(_))));

        let profile = store.update_profile(id, ProfilePatch::role(Role::Provider)).unwrap();
        assert_eq!(profile.role, Role::Provider);
    }

    #[test]
    fn test_delete_user_reports_cascade() {
        let store = InMemoryStore::new();
        let id = create_account(&store, "test@example.com");
        store
            .apply(vec![Write::InsertNotification(Notification::new(
                id,
                marketplace_core::NotificationKind::RoleChanged,
                "hello",
                Utc::now(),
            ))])
            .unwrap();

        let events = store.apply(vec![Write::DeleteUser(id)]).unwrap();

        assert!(events
            .iter()
            .any(|e| e.table == Table::Notifications && e.op == ChangeOp::Delete));
        assert!(events
            .iter()
            .any(|e| e.table == Table::Profiles && e.op == ChangeOp::Delete));
        assert!(store.read_profile(id).unwrap().is_none());
        assert!(store.get_account_by_email("test@example.com").unwrap().is_none());
        assert!(store.list_notifications(id).unwrap().is_empty());
    }

    #[test]
    fn test_session_lifecycle() {
        let store = InMemorySessionStore::new();
        let user = UserId::new();

        let session = store.create(user).unwrap();
        assert!(store.get(&session.id).unwrap().is_some());

        store.delete(&session.id).unwrap();
        assert!(store.get(&session.id).unwrap().is_none());

        store.create(user).unwrap();
        store.create(user).unwrap();
        store.create(UserId::new()).unwrap();
        assert_eq!(store.delete_for_user(user).unwrap(), 2);
    }
}
