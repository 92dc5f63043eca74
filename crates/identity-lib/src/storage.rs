// ============================
// crates/identity-lib/src/storage.rs
// ============================
//! Credential storage abstraction with in-memory and flat-file implementations.
use std::fmt;

use async_trait::async_trait;
use campus_identity_common::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::AppError;

mod flat_file;
mod memory;

pub use flat_file::FlatFileCredentialStore;
pub use memory::InMemoryCredentialStore;

/// Generate a fresh user identifier
pub fn new_user_id() -> String {
    Uuid::new_v4().to_string()
}

/// A stored user. Only [`UserProfile`] ever leaves the service.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub nickname: String,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker; deleted records are invisible to lookups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.id.clone(),
            email: self.email.clone(),
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("nickname", &self.nickname)
            .field("avatar", &self.avatar)
            .field("created_at", &self.created_at)
            .field("deleted_at", &self.deleted_at)
            .finish()
    }
}

/// Durable user records keyed by identifier and unique email.
///
/// Implementations must enforce email uniqueness atomically inside `create`;
/// a lookup before inserting is not enough under concurrent registration.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new record, failing with `AlreadyExists` if a live record has the same email
    async fn create(&self, ctx: &RequestContext, record: UserRecord) -> Result<String, AppError>;

    /// Look up a live record by exact email
    async fn get_by_email(&self, ctx: &RequestContext, email: &str) -> Result<UserRecord, AppError>;

    /// Look up a live record by identifier
    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> Result<UserRecord, AppError>;
}

fn user_not_found() -> AppError {
    AppError::NotFound("user not found".to_string())
}

fn reject_deleted(record: &UserRecord) -> Result<(), AppError> {
    if record.is_deleted() {
        return Err(AppError::InvalidInput(
            "cannot create an already deleted record".to_string(),
        ));
    }
    Ok(())
}
