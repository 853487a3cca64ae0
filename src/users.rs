/// Collaborator interfaces consumed by the auth core.
///
/// The user store is queried once, at login, to build the initial identity
/// claims; tokens are never re-checked against it. The audit sink is
/// fire-and-forget: its outcome must never influence an authentication
/// decision.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
}

/// Login-time identity lookup.
pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> Option<UserRecord>;

    /// # Errors
    /// Returns a conflict if the email is already registered.
    fn insert(&self, user: NewUser) -> Result<UserRecord, AppError>;
}

pub struct InMemoryUserStore {
    users: Mutex<Vec<UserRecord>>,
    next_id: AtomicI64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let users = self.users.lock().unwrap();
        users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    fn insert(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let record = UserRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
        };
        users.push(record.clone());
        Ok(record)
    }
}

/// A security-relevant occurrence worth recording out-of-band.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: String,
    pub user_id: Option<i64>,
    pub ip: Option<String>,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            user_id: None,
            ip: None,
            detail: None,
            at: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Fire-and-forget audit recording. Implementations must be infallible from
/// the caller's point of view.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: emits the event into the structured log stream.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            action = %event.action,
            user_id = event.user_id,
            ip = event.ip.as_deref(),
            detail = event.detail.as_deref(),
            at = %event.at.to_rfc3339(),
            "Audit event"
        );
    }
}
