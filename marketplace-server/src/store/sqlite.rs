//! SQLite-based storage implementation

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use marketplace_core::{
    AdminAction, AuditEntry, AuditId, ContactInfo, Error, Notification, NotificationId,
    NotificationKind, Profile, RequestId, RequestStatus, Review, Role, ServiceId,
    ServiceListing, SubscriptionPlan, UserId, VerificationRequest, VerificationStatus,
};

use super::{
    Account, ChangeEvent, ChangeOp, RecordStore, Session, SessionId, SessionStore, StoreResult,
    Table, Write,
};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

const PROFILE_COLUMNS: &str = "id, role, full_name, phone, address, verification_status, \
     subscription_plan, subscription_expiry, can_access_contact, created_at, updated_at";

const REQUEST_COLUMNS: &str = "id, user_id, status, full_name, phone, additional_info, \
     submitted_at, reviewed_by, reviewer_notes, reviewed_at";

const SERVICE_COLUMNS: &str = "id, owner_id, title, category, description, is_active, \
     contact_phone, contact_email, created_at";

fn internal(e: rusqlite::Error) -> Error {
    Error::transient(e.to_string())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Fixed-width so that text ordering matches time ordering
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn get_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion(idx, format!("bad timestamp {raw}: {e}")))
}

fn get_opt_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion(idx, format!("bad timestamp {raw}: {e}")))
    })
    .transpose()
}

fn get_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion(idx, format!("bad id {raw}: {e}")))
}

fn get_enum<T>(row: &Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion(idx, format!("unknown value {raw}")))
}

fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: UserId(get_uuid(row, 0)?),
        role: get_enum(row, 1, Role::parse)?,
        full_name: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        verification_status: get_enum(row, 5, VerificationStatus::parse)?,
        subscription_plan: get_enum(row, 6, SubscriptionPlan::parse)?,
        subscription_expiry: get_opt_ts(row, 7)?,
        can_access_contact: row.get::<_, i32>(8)? != 0,
        created_at: get_ts(row, 9)?,
        updated_at: get_ts(row, 10)?,
    })
}

fn request_from_row(row: &Row) -> rusqlite::Result<VerificationRequest> {
    let reviewed_by: Option<String> = row.get(7)?;
    let review = match reviewed_by {
        Some(raw) => Some(Review {
            reviewed_by: UserId(
                Uuid::parse_str(&raw).map_err(|e| conversion(7, format!("bad id {raw}: {e}")))?,
            ),
            notes: row.get(8)?,
            reviewed_at: get_ts(row, 9)?,
        }),
        None => None,
    };

    Ok(VerificationRequest {
        id: RequestId(get_uuid(row, 0)?),
        user_id: UserId(get_uuid(row, 1)?),
        status: get_enum(row, 2, RequestStatus::parse)?,
        full_name: row.get(3)?,
        phone: row.get(4)?,
        additional_info: row.get(5)?,
        submitted_at: get_ts(row, 6)?,
        review,
    })
}

fn service_from_row(row: &Row) -> rusqlite::Result<ServiceListing> {
    let phone: Option<String> = row.get(6)?;
    let email: Option<String> = row.get(7)?;
    Ok(ServiceListing {
        id: ServiceId(get_uuid(row, 0)?),
        owner: UserId(get_uuid(row, 1)?),
        title: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        is_active: row.get::<_, i32>(5)? != 0,
        contact: match (phone, email) {
            (None, None) => None,
            (phone, email) => Some(ContactInfo { phone, email }),
        },
        created_at: get_ts(row, 8)?,
    })
}

fn notification_from_row(row: &Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: NotificationId(get_uuid(row, 0)?),
        user_id: UserId(get_uuid(row, 1)?),
        kind: get_enum(row, 2, NotificationKind::parse)?,
        message: row.get(3)?,
        created_at: get_ts(row, 4)?,
        read: row.get::<_, i32>(5)? != 0,
    })
}

fn audit_from_row(row: &Row) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: AuditId(get_uuid(row, 0)?),
        actor: UserId(get_uuid(row, 1)?),
        target: UserId(get_uuid(row, 2)?),
        action: get_enum(row, 3, AdminAction::parse)?,
        reason: row.get(4)?,
        at: get_ts(row, 5)?,
    })
}

/// SQLite-based store implementing both RecordStore and SessionStore
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(internal)?;

        // Enable foreign keys
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(internal)?;

        // Run migrations
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::transient("sqlite connection lock poisoned"))
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), Error> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(internal)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, Error> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(internal)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(internal)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), Error> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                full_name TEXT,
                phone TEXT,
                address TEXT,
                verification_status TEXT NOT NULL,
                subscription_plan TEXT NOT NULL,
                subscription_expiry TEXT,
                can_access_contact INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK ((subscription_plan = 'free') = (subscription_expiry IS NULL))
            );

            CREATE TABLE IF NOT EXISTS verification_requests (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                status TEXT NOT NULL,
                full_name TEXT NOT NULL,
                phone TEXT NOT NULL,
                additional_info TEXT,
                submitted_at TEXT NOT NULL,
                reviewed_by TEXT,
                reviewer_notes TEXT,
                reviewed_at TEXT,
                CHECK ((status = 'pending') = (reviewed_by IS NULL))
            );
            CREATE INDEX IF NOT EXISTS idx_requests_user_id ON verification_requests(user_id);
            -- At most one pending request per user
            CREATE UNIQUE INDEX IF NOT EXISTS idx_requests_one_pending
                ON verification_requests(user_id) WHERE status = 'pending';

            CREATE TABLE IF NOT EXISTS services (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                description TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                contact_phone TEXT,
                contact_email TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_services_owner ON services(owner_id);

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL,
                read INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id);

            -- No foreign keys: audit rows outlive their target
            CREATE TABLE IF NOT EXISTS audit_log (
                id TEXT PRIMARY KEY,
                actor_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                action TEXT NOT NULL,
                reason TEXT,
                at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(internal)?;

        Ok(())
    }

    fn require_account(conn: &Connection, user_id: UserId) -> StoreResult<()> {
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE id = ?1)",
                params![user_id.to_string()],
                |row| row.get(0),
            )
            .map_err(internal)?;
        if exists {
            Ok(())
        } else {
            Err(Error::not_found(format!("user {user_id}")))
        }
    }

    fn select_profile(conn: &Connection, user_id: UserId) -> StoreResult<Option<Profile>> {
        conn.query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            params![user_id.to_string()],
            profile_from_row,
        )
        .optional()
        .map_err(internal)
    }

    fn write_profile(conn: &Connection, profile: &Profile) -> StoreResult<()> {
        conn.execute(
            "UPDATE profiles SET role = ?2, full_name = ?3, phone = ?4, address = ?5,
                 verification_status = ?6, subscription_plan = ?7, subscription_expiry = ?8,
                 can_access_contact = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                profile.id.to_string(),
                profile.role.as_str(),
                profile.full_name,
                profile.phone,
                profile.address,
                profile.verification_status.as_str(),
                profile.subscription_plan.as_str(),
                profile.subscription_expiry.as_ref().map(ts),
                profile.can_access_contact as i32,
                ts(&profile.updated_at),
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn collect_ids(conn: &Connection, sql: &str, user_id: UserId) -> StoreResult<Vec<String>> {
        let mut stmt = conn.prepare(sql).map_err(internal)?;
        let ids = stmt
            .query_map(params![user_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(ids)
    }

    fn apply_write(
        conn: &Connection,
        write: Write,
        now: DateTime<Utc>,
        events: &mut Vec<ChangeEvent>,
    ) -> StoreResult<()> {
        match write {
            Write::CreateAccount { account, profile } => {
                conn.execute(
                    "INSERT INTO accounts (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        account.id.to_string(),
                        account.email.to_lowercase(),
                        account.password_hash,
                        ts(&account.created_at),
                    ],
                )
                .map_err(|e| {
                    if is_constraint_violation(&e) {
                        return Error::conflict("email already registered");
                    }
                    internal(e)
                })?;

                conn.execute(
                    &format!(
                        "INSERT INTO profiles ({PROFILE_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                    ),
                    params![
                        profile.id.to_string(),
                        profile.role.as_str(),
                        profile.full_name,
                        profile.phone,
                        profile.address,
                        profile.verification_status.as_str(),
                        profile.subscription_plan.as_str(),
                        profile.subscription_expiry.as_ref().map(ts),
                        profile.can_access_contact as i32,
                        ts(&profile.created_at),
                        ts(&profile.updated_at),
                    ],
                )
                .map_err(internal)?;
                events.push(ChangeEvent::new(Table::Profiles, ChangeOp::Insert, account.id, account.id));
            }
            Write::UpdateProfile {
                user_id,
                expect,
                patch,
            } => {
                let mut profile = Self::select_profile(conn, user_id)?
                    .ok_or_else(|| Error::not_found(format!("profile {user_id}")))?;
                if let Some(allowed) = expect {
                    if !allowed.contains(&profile.verification_status) {
                        return Err(Error::conflict(format!(
                            "profile {user_id} is now {}",
                            profile.verification_status.as_str()
                        )));
                    }
                }
                patch.apply_to(&mut profile, now);
                Self::write_profile(conn, &profile)?;
                events.push(ChangeEvent::new(Table::Profiles, ChangeOp::Update, user_id, user_id));
            }
            Write::InsertRequest(request) => {
                Self::require_account(conn, request.user_id)?;
                conn.execute(
                    &format!(
                        "INSERT INTO verification_requests ({REQUEST_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, NULL)"
                    ),
                    params![
                        request.id.to_string(),
                        request.user_id.to_string(),
                        request.status.as_str(),
                        request.full_name,
                        request.phone,
                        request.additional_info,
                        ts(&request.submitted_at),
                    ],
                )
                .map_err(|e| {
                    if is_constraint_violation(&e) {
                        return Error::conflict("a verification request is already pending review");
                    }
                    internal(e)
                })?;
                events.push(ChangeEvent::new(
                    Table::VerificationRequests,
                    ChangeOp::Insert,
                    request.id,
                    request.user_id,
                ));
            }
            Write::ReviewRequest { id, status, review } => {
                let current: Option<(String, String)> = conn
                    .query_row(
                        "SELECT user_id, status FROM verification_requests WHERE id = ?1",
                        params![id.to_string()],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()
                    .map_err(internal)?;
                let (owner, current_status) =
                    current.ok_or_else(|| Error::not_found(format!("verification request {id}")))?;

                // The status guard makes the update conditional at the store
                let rows = conn
                    .execute(
                        "UPDATE verification_requests
                         SET status = ?2, reviewed_by = ?3, reviewer_notes = ?4, reviewed_at = ?5
                         WHERE id = ?1 AND status = 'pending'",
                        params![
                            id.to_string(),
                            status.as_str(),
                            review.reviewed_by.to_string(),
                            review.notes,
                            ts(&review.reviewed_at),
                        ],
                    )
                    .map_err(internal)?;
                if rows == 0 {
                    return Err(Error::conflict(format!(
                        "request {id} was already {current_status}"
                    )));
                }
                let owner = Uuid::parse_str(&owner).map_err(|e| Error::transient(e.to_string()))?;
                events.push(ChangeEvent::new(
                    Table::VerificationRequests,
                    ChangeOp::Update,
                    id,
                    UserId(owner),
                ));
            }
            Write::InsertService(service) => {
                Self::require_account(conn, service.owner)?;
                let contact = service.contact.clone().unwrap_or_default();
                conn.execute(
                    &format!(
                        "INSERT INTO services ({SERVICE_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                    ),
                    params![
                        service.id.to_string(),
                        service.owner.to_string(),
                        service.title,
                        service.category,
                        service.description,
                        service.is_active as i32,
                        contact.phone,
                        contact.email,
                        ts(&service.created_at),
                    ],
                )
                .map_err(internal)?;
                events.push(ChangeEvent::new(
                    Table::Services,
                    ChangeOp::Insert,
                    service.id,
                    service.owner,
                ));
            }
            Write::InsertNotification(notification) => {
                Self::require_account(conn, notification.user_id)?;
                conn.execute(
                    "INSERT INTO notifications (id, user_id, kind, message, created_at, read)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        notification.id.to_string(),
                        notification.user_id.to_string(),
                        notification.kind.as_str(),
                        notification.message,
                        ts(&notification.created_at),
                        notification.read as i32,
                    ],
                )
                .map_err(internal)?;
                events.push(ChangeEvent::new(
                    Table::Notifications,
                    ChangeOp::Insert,
                    notification.id,
                    notification.user_id,
                ));
            }
            Write::MarkNotificationRead { id, user_id } => {
                let rows = conn
                    .execute(
                        "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                        params![id.to_string(), user_id.to_string()],
                    )
                    .map_err(internal)?;
                if rows == 0 {
                    return Err(Error::not_found(format!("notification {id}")));
                }
                events.push(ChangeEvent::new(Table::Notifications, ChangeOp::Update, id, user_id));
            }
            Write::InsertAudit(entry) => {
                conn.execute(
                    "INSERT INTO audit_log (id, actor_id, target_id, action, reason, at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        entry.id.to_string(),
                        entry.actor.to_string(),
                        entry.target.to_string(),
                        entry.action.as_str(),
                        entry.reason,
                        ts(&entry.at),
                    ],
                )
                .map_err(internal)?;
            }
            Write::DeleteUser(user_id) => {
                let cascades = [
                    (
                        Table::VerificationRequests,
                        "SELECT id FROM verification_requests WHERE user_id = ?1",
                    ),
                    (Table::Services, "SELECT id FROM services WHERE owner_id = ?1"),
                    (Table::Notifications, "SELECT id FROM notifications WHERE user_id = ?1"),
                ];
                let mut removed = Vec::new();
                for (table, sql) in cascades {
                    for key in Self::collect_ids(conn, sql, user_id)? {
                        removed.push(ChangeEvent::new(table, ChangeOp::Delete, key, user_id));
                    }
                }

                // Foreign keys with ON DELETE CASCADE handle the owned rows and sessions
                let rows = conn
                    .execute("DELETE FROM accounts WHERE id = ?1", params![user_id.to_string()])
                    .map_err(internal)?;
                if rows == 0 {
                    return Err(Error::not_found(format!("user {user_id}")));
                }

                events.extend(removed);
                events.push(ChangeEvent::new(Table::Profiles, ChangeOp::Delete, user_id, user_id));
            }
        }
        Ok(())
    }
}

impl RecordStore for SqliteStore {
    fn apply(&self, batch: Vec<Write>) -> StoreResult<Vec<ChangeEvent>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(internal)?;
        let now = Utc::now();
        let mut events = Vec::new();

        // Returning early drops `tx`, which rolls the whole batch back
        for write in batch {
            Self::apply_write(&tx, write, now, &mut events)?;
        }

        tx.commit().map_err(internal)?;
        Ok(events)
    }

    fn get_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, email, password_hash, created_at FROM accounts WHERE email = ?1",
            params![email.to_lowercase()],
            |row| {
                Ok(Account {
                    id: UserId(get_uuid(row, 0)?),
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: get_ts(row, 3)?,
                })
            },
        )
        .optional()
        .map_err(internal)
    }

    fn read_profile(&self, user_id: UserId) -> StoreResult<Option<Profile>> {
        let conn = self.conn()?;
        Self::select_profile(&conn, user_id)
    }

    fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at"))
            .map_err(internal)?;
        let profiles = stmt
            .query_map([], profile_from_row)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(profiles)
    }

    fn get_verification_request(&self, id: RequestId) -> StoreResult<Option<VerificationRequest>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM verification_requests WHERE id = ?1"),
            params![id.to_string()],
            request_from_row,
        )
        .optional()
        .map_err(internal)
    }

    fn requests_for_user(&self, user_id: UserId) -> StoreResult<Vec<VerificationRequest>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM verification_requests
                 WHERE user_id = ?1 ORDER BY submitted_at"
            ))
            .map_err(internal)?;
        let requests = stmt
            .query_map(params![user_id.to_string()], request_from_row)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(requests)
    }

    fn list_verification_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<VerificationRequest>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM verification_requests
                 WHERE ?1 IS NULL OR status = ?1 ORDER BY submitted_at"
            ))
            .map_err(internal)?;
        let requests = stmt
            .query_map(params![status.map(|s| s.as_str())], request_from_row)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(requests)
    }

    fn get_service(&self, id: ServiceId) -> StoreResult<Option<ServiceListing>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
            params![id.to_string()],
            service_from_row,
        )
        .optional()
        .map_err(internal)
    }

    fn list_services(&self, owner: Option<UserId>) -> StoreResult<Vec<ServiceListing>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SERVICE_COLUMNS} FROM services
                 WHERE ?1 IS NULL OR owner_id = ?1 ORDER BY created_at"
            ))
            .map_err(internal)?;
        let services = stmt
            .query_map(params![owner.map(|o| o.to_string())], service_from_row)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(services)
    }

    fn list_notifications(&self, user_id: UserId) -> StoreResult<Vec<Notification>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, kind, message, created_at, read FROM notifications
                 WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(internal)?;
        let notifications = stmt
            .query_map(params![user_id.to_string()], notification_from_row)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(notifications)
    }

    fn list_audit(&self) -> StoreResult<Vec<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, actor_id, target_id, action, reason, at FROM audit_log ORDER BY at")
            .map_err(internal)?;
        let entries = stmt
            .query_map([], audit_from_row)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(entries)
    }
}

impl SessionStore for SqliteStore {
    fn create(&self, user_id: UserId) -> StoreResult<Session> {
        let conn = self.conn()?;
        let session = Session {
            id: SessionId(Uuid::new_v4().to_string()),
            user_id,
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO sessions (id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![
                session.id.0,
                session.user_id.to_string(),
                ts(&session.created_at),
            ],
        )
        .map_err(internal)?;

        Ok(session)
    }

    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT id, user_id, created_at FROM sessions WHERE id = ?1",
            params![session_id.0],
            |row| {
                Ok(Session {
                    id: SessionId(row.get(0)?),
                    user_id: UserId(get_uuid(row, 1)?),
                    created_at: get_ts(row, 2)?,
                })
            },
        )
        .optional()
        .map_err(internal)
    }

    fn delete(&self, session_id: &SessionId) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id.0])
            .map_err(internal)?;

        Ok(())
    }

    fn delete_for_user(&self, user_id: UserId) -> StoreResult<u64> {
        let conn = self.conn()?;

        let rows = conn
            .execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id.to_string()])
            .map_err(internal)?;

        Ok(rows as u64)
    }
}
