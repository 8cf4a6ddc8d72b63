//! Username/password verification for the login path.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use warden_core::SubjectId;

use crate::{PasswordHashError, PasswordHasher, Role};

/// Stored credential for one subject.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub subject_id: SubjectId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

impl core::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("subject_id", &self.subject_id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Error)]
#[error("credential store unavailable: {0}")]
pub struct StoreError(pub String);

/// Lookup port implemented by the storage adapter.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError>;
}

/// Identity established by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Unknown username. Callers should report this exactly like
    /// [`CredentialError::InvalidCredential`].
    #[error("subject not found")]
    NotFound,

    #[error("invalid credential")]
    InvalidCredential,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hashing(#[from] PasswordHashError),

    #[error("password verification task aborted")]
    Aborted,
}

/// Checks a submitted username/password against the [`CredentialStore`].
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    // Verified against on unknown usernames so both failure paths cost one
    // hash computation.
    dummy_hash: Arc<str>,
}

impl CredentialVerifier {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, PasswordHashError> {
        let dummy_hash = hasher.hash("warden-dummy-password")?.into();
        Ok(Self {
            store,
            hasher,
            dummy_hash,
        })
    }

    pub fn hasher(&self) -> &Arc<dyn PasswordHasher> {
        &self.hasher
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, CredentialError> {
        let record = self.store.find_by_username(username).await?;

        let hash = match &record {
            Some(r) => Arc::<str>::from(r.password_hash.as_str()),
            None => self.dummy_hash.clone(),
        };

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|_| CredentialError::Aborted)??;

        match record {
            Some(record) if matches => Ok(Identity {
                subject_id: record.subject_id,
                subject_name: record.username,
                role: record.role,
            }),
            Some(_) => {
                tracing::debug!(username, "password mismatch");
                Err(CredentialError::InvalidCredential)
            }
            None => {
                tracing::debug!(username, "unknown username");
                Err(CredentialError::NotFound)
            }
        }
    }
}

impl core::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}
