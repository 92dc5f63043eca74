//! In-process credential store.
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

use super::{reject_deleted, user_not_found, CredentialStore, UserRecord};
use crate::context::RequestContext;
use crate::error::AppError;

/// Credential store backed by concurrent maps.
///
/// The email index is the unique constraint: a record becomes visible only
/// once its email entry has been claimed through the vacant-entry path, which
/// holds the shard lock for that email.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: DashMap<String, UserRecord>,
    /// email -> id, live records only
    emails: DashMap<String, String>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with existing records, soft-deleted ones included
    pub fn with_records(records: impl IntoIterator<Item = UserRecord>) -> Result<Self, AppError> {
        let store = Self::new();
        for record in records {
            if !record.is_deleted() {
                match store.emails.entry(record.email.clone()) {
                    Entry::Occupied(_) => return Err(AppError::AlreadyExists),
                    Entry::Vacant(slot) => {
                        slot.insert(record.id.clone());
                    },
                }
            }
            store.users.insert(record.id.clone(), record);
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn live_by_id(&self, id: &str) -> Result<UserRecord, AppError> {
        self.users
            .get(id)
            .filter(|record| !record.is_deleted())
            .map(|record| record.value().clone())
            .ok_or_else(user_not_found)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create(&self, ctx: &RequestContext, record: UserRecord) -> Result<String, AppError> {
        ctx.check()?;
        reject_deleted(&record)?;

        match self.emails.entry(record.email.clone()) {
            Entry::Occupied(_) => Err(AppError::AlreadyExists),
            Entry::Vacant(slot) => {
                let id = record.id.clone();
                match self.users.entry(id.clone()) {
                    Entry::Occupied(_) => {
                        return Err(AppError::Store(format!("identifier collision for {id}")));
                    },
                    Entry::Vacant(user_slot) => {
                        user_slot.insert(record);
                    },
                }
                slot.insert(id.clone());
                Ok(id)
            },
        }
    }

    async fn get_by_email(&self, ctx: &RequestContext, email: &str) -> Result<UserRecord, AppError> {
        ctx.check()?;

        let id = self
            .emails
            .get(email)
            .map(|id| id.value().clone())
            .ok_or_else(user_not_found)?;
        self.live_by_id(&id)
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> Result<UserRecord, AppError> {
        ctx.check()?;
        self.live_by_id(id)
    }
}
