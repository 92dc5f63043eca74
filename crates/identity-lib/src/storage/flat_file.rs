//! Flat-file credential store.
//!
//! Layout under the root directory:
//! - `users/<id>.json`: one JSON document per user record
//! - `emails/<sha256(email)>.json`: email claim naming the owning id and the email
//! - `emails/<sha256(email)>.lock`: held while a stale claim is being reclaimed
//!
//! A claim is written in full to a private temp file and then published with
//! `hard_link`, which fails atomically if the target exists. That exclusive
//! link is the unique constraint on email, and a visible claim is never partial.
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::{fs as tokio_fs, io::AsyncWriteExt};
use uuid::Uuid;

use super::{reject_deleted, user_not_found, CredentialStore, UserRecord};
use crate::context::RequestContext;
use crate::error::AppError;

#[derive(Serialize, Deserialize)]
struct EmailClaim {
    user_id: String,
    email: String,
}

/// Flat-file implementation of the [`CredentialStore`] trait
#[derive(Clone, Debug)]
pub struct FlatFileCredentialStore {
    root: PathBuf,
}

impl FlatFileCredentialStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("users"))?;
        fs::create_dir_all(root.join("emails"))?;
        Ok(Self { root })
    }

    fn user_path(&self, id: &str) -> Result<PathBuf, AppError> {
        // Ids become file names, so only accept what we generate.
        let id = Uuid::parse_str(id).map_err(|_| user_not_found())?;
        Ok(self.root.join("users").join(format!("{id}.json")))
    }

    /// Fixed-length file stem for an email, whatever its length or bytes.
    fn claim_stem(email: &str) -> String {
        hex::encode(Sha256::digest(email.as_bytes()))
    }

    fn claim_path(&self, email: &str) -> PathBuf {
        self.root
            .join("emails")
            .join(format!("{}.json", Self::claim_stem(email)))
    }

    fn lock_path(&self, email: &str) -> PathBuf {
        self.root
            .join("emails")
            .join(format!("{}.lock", Self::claim_stem(email)))
    }

    async fn read_record(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        let path = self.user_path(id)?;
        match tokio_fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The claim held on `email`, if any. A claim that does not parse, or that
    /// belongs to a different email with the same digest, is reported as
    /// `Some(None)`: the name is taken but not by a usable claim.
    async fn read_claim(&self, email: &str) -> Result<Option<Option<EmailClaim>>, AppError> {
        match tokio_fs::read_to_string(self.claim_path(email)).await {
            Ok(content) => match serde_json::from_str::<EmailClaim>(&content) {
                Ok(claim) if claim.email == email => Ok(Some(Some(claim))),
                Ok(_) => Ok(Some(None)),
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable email claim");
                    Ok(Some(None))
                },
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn live_by_id(&self, id: &str) -> Result<UserRecord, AppError> {
        match self.read_record(id).await? {
            Some(record) if !record.is_deleted() => Ok(record),
            _ => Err(user_not_found()),
        }
    }

    /// Atomically claim `email` for `user_id`. `Ok(false)` if it is already taken.
    async fn try_claim(&self, email: &str, user_id: &str) -> Result<bool, AppError> {
        let claim = serde_json::to_vec(&EmailClaim {
            user_id: user_id.to_string(),
            email: email.to_string(),
        })?;

        let tmp = self
            .root
            .join("emails")
            .join(format!(".{}.tmp", Uuid::new_v4()));
        let published = async {
            let mut file = tokio_fs::File::create(&tmp).await?;
            file.write_all(&claim).await?;
            file.sync_all().await?;
            drop(file);

            match tokio_fs::hard_link(&tmp, self.claim_path(email)).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(AppError::from(e)),
            }
        }
        .await;

        if let Err(e) = tokio_fs::remove_file(&tmp).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(error = %e, path = %tmp.display(), "temp claim not removed");
            }
        }
        published
    }

    /// Claim `email` for `user_id` when the current claim is owned by a
    /// soft-deleted record.
    ///
    /// Runs under the email's lock file, so at most one caller inspects and
    /// removes a claim at a time. A claim whose owner record is missing belongs
    /// to a create still in flight and counts as live.
    async fn reclaim(&self, email: &str, user_id: &str) -> Result<bool, AppError> {
        let lock = self.lock_path(email);
        match tokio_fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock)
            .await
        {
            Ok(_) => {},
            // Another reclaim of this email is in progress; let it decide.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        let result = self.reclaim_locked(email, user_id).await;

        if let Err(e) = tokio_fs::remove_file(&lock).await {
            tracing::warn!(error = %e, path = %lock.display(), "reclaim lock not released");
        }
        result
    }

    async fn reclaim_locked(&self, email: &str, user_id: &str) -> Result<bool, AppError> {
        match self.read_claim(email).await? {
            None => {},
            Some(Some(claim)) => match self.read_record(&claim.user_id).await? {
                Some(owner) if owner.is_deleted() => {
                    match tokio_fs::remove_file(self.claim_path(email)).await {
                        Ok(()) => {},
                        Err(e) if e.kind() == ErrorKind::NotFound => {},
                        Err(e) => return Err(e.into()),
                    }
                    tracing::debug!(previous_owner = %claim.user_id, "stale email claim released");
                },
                _ => return Ok(false),
            },
            Some(None) => return Ok(false),
        }
        // A plain claim may still win the freed name first; then this one loses.
        self.try_claim(email, user_id).await
    }

    async fn write_record(&self, record: &UserRecord) -> Result<(), AppError> {
        let path = self.user_path(&record.id)?;
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record)?;
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FlatFileCredentialStore {
    async fn create(&self, ctx: &RequestContext, record: UserRecord) -> Result<String, AppError> {
        ctx.check()?;
        reject_deleted(&record)?;
        let path = self.user_path(&record.id)?;
        if tokio_fs::try_exists(&path).await? {
            return Err(AppError::Store(format!("identifier collision for {}", record.id)));
        }

        // From here on the write runs to completion; it is not raced against
        // cancellation so a claim is never left without its record.
        let claimed = self.try_claim(&record.email, &record.id).await?
            || self.reclaim(&record.email, &record.id).await?;
        if !claimed {
            return Err(AppError::AlreadyExists);
        }

        if let Err(e) = self.write_record(&record).await {
            // Roll back the claim so the email is not blocked by a missing record.
            let claim = self.claim_path(&record.email);
            if let Err(rollback) = tokio_fs::remove_file(&claim).await {
                tracing::warn!(
                    user_id = %record.id,
                    error = %rollback,
                    path = %claim.display(),
                    "email claim rollback failed; email stays blocked"
                );
            }
            return Err(e);
        }

        tracing::debug!(user_id = %record.id, "user record written");
        Ok(record.id)
    }

    async fn get_by_email(&self, ctx: &RequestContext, email: &str) -> Result<UserRecord, AppError> {
        ctx.run(async {
            let claim = self
                .read_claim(email)
                .await?
                .flatten()
                .ok_or_else(user_not_found)?;
            let record = self.live_by_id(&claim.user_id).await?;
            if record.email != email {
                return Err(user_not_found());
            }
            Ok(record)
        })
        .await
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> Result<UserRecord, AppError> {
        ctx.run(self.live_by_id(id)).await
    }
}
