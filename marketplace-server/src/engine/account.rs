//! Sign-up, sign-in and owner-side profile operations

use chrono::Utc;
use serde::Deserialize;

use marketplace_core::{
    can_access_contact, Error, Notification, NotificationId, Profile, Result, Role,
    SessionIdentity,
};

use super::require_session;
use crate::crypto::{hash_password, verify_password};
use crate::state::AppState;
use crate::store::{
    Account, ProfilePatch, RecordStore, Session, SessionId, SessionStore, Write,
};

/// Minimum password length
const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum password length
const MAX_PASSWORD_LENGTH: usize = 80;

#[derive(Debug, Clone, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Fields the owner may change on their own profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileEdit {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

fn validate_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(Error::invalid("a valid email address is required")),
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(Error::invalid(format!(
            "password too short (minimum {MIN_PASSWORD_LENGTH} characters)"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(Error::invalid(format!(
            "password too long (maximum {MAX_PASSWORD_LENGTH} characters)"
        )));
    }
    Ok(())
}

fn non_blank(value: Option<String>, field: &str) -> Result<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => Err(Error::invalid(format!("{field} cannot be blank"))),
        Some(v) => Ok(Some(v.trim().to_string())),
        None => Ok(None),
    }
}

impl<R: RecordStore, S: SessionStore> AppState<R, S> {
    /// Create credentials and profile together, then open a session
    pub fn sign_up(&self, req: SignUp) -> Result<(Profile, Session)> {
        let email = validate_email(&req.email)?;
        validate_password(&req.password)?;
        if req.role == Role::Admin {
            return Err(Error::invalid("the admin role cannot be chosen at sign-up"));
        }
        let full_name = non_blank(req.full_name, "full name")?;

        if self.store.get_account_by_email(&email)?.is_some() {
            return Err(Error::conflict("email already registered"));
        }

        let password_hash = hash_password(&req.password, self.password_cost)
            .map_err(|e| Error::transient(e.to_string()))?;

        let now = Utc::now();
        let id = marketplace_core::UserId::new();
        let mut profile = Profile::new(id, req.role, now);
        profile.full_name = full_name;

        self.commit(vec![Write::CreateAccount {
            account: Account {
                id,
                email,
                password_hash,
                created_at: now,
            },
            profile: profile.clone(),
        }])?;
        tracing::info!(user_id = %id, role = req.role.as_str(), "Account created");

        let session = self.session_store.create(id)?;
        Ok((profile, session))
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let account = self
            .store
            .get_account_by_email(&email.trim().to_lowercase())?
            .ok_or(Error::AuthenticationRequired)?;

        let valid = verify_password(password, &account.password_hash)
            .map_err(|e| Error::transient(e.to_string()))?;
        if !valid {
            return Err(Error::AuthenticationRequired);
        }

        self.session_store.create(account.id)
    }

    pub fn sign_out(&self, session_id: &SessionId) -> Result<()> {
        self.session_store.delete(session_id)
    }

    /// The `getSession` primitive: who is behind this session, if anyone
    pub fn get_session(&self, session_id: &SessionId) -> Result<Option<SessionIdentity>> {
        Ok(self.session_store.get(session_id)?.map(|s| s.identity()))
    }

    pub fn my_profile(&self, caller: Option<&SessionIdentity>) -> Result<Profile> {
        let user_id = require_session(caller)?;
        self.read_profile(user_id)
    }

    /// Owner edit of name, phone and address. Nothing else is reachable here.
    pub fn update_own_profile(
        &self,
        caller: Option<&SessionIdentity>,
        edit: ProfileEdit,
    ) -> Result<Profile> {
        let user_id = require_session(caller)?;
        let patch = ProfilePatch {
            full_name: non_blank(edit.full_name, "full name")?,
            phone: non_blank(edit.phone, "phone")?,
            address: non_blank(edit.address, "address")?,
            ..ProfilePatch::default()
        };
        if patch == ProfilePatch::default() {
            return Err(Error::invalid("nothing to update"));
        }

        self.commit(vec![Write::UpdateProfile {
            user_id,
            expect: None,
            patch,
        }])?;
        self.read_profile(user_id)
    }

    /// Server-side entitlement: evaluated against a fresh profile read.
    ///
    /// Any failure to read counts as "no".
    pub fn contact_entitlement(&self, caller: Option<&SessionIdentity>) -> bool {
        let Some(session) = caller else {
            return false;
        };
        match self.store.read_profile(session.user_id) {
            Ok(profile) => can_access_contact(Some(session), profile.as_ref(), Utc::now()),
            Err(e) => {
                tracing::warn!(user_id = %session.user_id, error = %e, "Entitlement read failed");
                false
            }
        }
    }

    pub fn notifications(&self, caller: Option<&SessionIdentity>) -> Result<Vec<Notification>> {
        let user_id = require_session(caller)?;
        self.store.list_notifications(user_id)
    }

    pub fn mark_notification_read(
        &self,
        caller: Option<&SessionIdentity>,
        id: NotificationId,
    ) -> Result<()> {
        let user_id = require_session(caller)?;
        self.commit(vec![Write::MarkNotificationRead { id, user_id }])
    }

    /// Create the protected admin account if it does not exist yet.
    ///
    /// Returns whether it was created.
    pub fn ensure_protected_admin(&self, email: &str, password: &str) -> Result<bool> {
        let id = self.protected_account;
        if self.store.read_profile(id)?.is_some() {
            return Ok(false);
        }

        let email = validate_email(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password, self.password_cost)
            .map_err(|e| Error::transient(e.to_string()))?;

        let now = Utc::now();
        self.commit(vec![Write::CreateAccount {
            account: Account {
                id,
                email,
                password_hash,
                created_at: now,
            },
            profile: Profile::new(id, Role::Admin, now),
        }])?;
        tracing::info!(user_id = %id, "Protected admin account created");
        Ok(true)
    }
}
