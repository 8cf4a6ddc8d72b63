//! In-memory credential store for dev/tests and single-node deployments.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use warden_auth::{CredentialRecord, CredentialStore, PasswordHashError, PasswordHasher, Role, StoreError};
use warden_core::{DomainError, DomainResult, SubjectId};

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<SubjectId, CredentialRecord>,
    by_username: HashMap<String, SubjectId>,
    // Insertion order, for stable pagination.
    order: Vec<SubjectId>,
}

/// Credential records keyed by id with a unique username index.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Hash(#[from] PasswordHashError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Usernames are unique and compared verbatim.
    pub fn create(&self, username: &str, password_hash: String, role: Role) -> DomainResult<CredentialRecord> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::validation("username must not be empty"));
        }
        if role.is_empty() {
            return Err(DomainError::validation("role must not be empty"));
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.by_username.contains_key(username) {
            return Err(DomainError::conflict(format!("username `{username}` already exists")));
        }

        let record = CredentialRecord {
            subject_id: SubjectId::new(),
            username: username.to_string(),
            password_hash,
            role,
        };
        inner.by_username.insert(record.username.clone(), record.subject_id);
        inner.order.push(record.subject_id);
        inner.by_id.insert(record.subject_id, record.clone());
        Ok(record)
    }

    pub fn get(&self, id: SubjectId) -> DomainResult<CredentialRecord> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_id.get(&id).cloned().ok_or_else(DomainError::not_found)
    }

    /// One page of records in creation order, plus the total count.
    /// `page` is 1-based.
    pub fn list(&self, page: usize, page_size: usize) -> (Vec<CredentialRecord>, usize) {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let total = inner.order.len();
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let items = inner
            .order
            .iter()
            .skip(offset)
            .take(page_size)
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect();
        (items, total)
    }

    /// Replace the hash and/or role of an existing record.
    pub fn update(
        &self,
        id: SubjectId,
        password_hash: Option<String>,
        role: Option<Role>,
    ) -> DomainResult<CredentialRecord> {
        if role.as_ref().is_some_and(Role::is_empty) {
            return Err(DomainError::validation("role must not be empty"));
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let record = inner.by_id.get_mut(&id).ok_or_else(DomainError::not_found)?;
        if let Some(hash) = password_hash {
            record.password_hash = hash;
        }
        if let Some(role) = role {
            record.role = role;
        }
        Ok(record.clone())
    }

    pub fn delete(&self, id: SubjectId) -> DomainResult<CredentialRecord> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let record = inner.by_id.remove(&id).ok_or_else(DomainError::not_found)?;
        inner.by_username.remove(&record.username);
        inner.order.retain(|other| *other != id);
        Ok(record)
    }

    pub fn has_role(&self, role: &Role) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_id.values().any(|r| &r.role == role)
    }

    /// Create the bootstrap admin unless a subject with `role` already exists.
    ///
    /// Returns the new record, or `None` when nothing was created.
    pub fn seed_admin(
        &self,
        hasher: &dyn PasswordHasher,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Option<CredentialRecord>, SeedError> {
        if self.has_role(&role) {
            tracing::debug!(role = %role, "bootstrap admin skipped: role already assigned");
            return Ok(None);
        }
        if password.is_empty() {
            return Err(DomainError::validation("bootstrap admin password must not be empty").into());
        }

        let record = self.create(username, hasher.hash(password)?, role)?;
        tracing::info!(
            subject_id = %record.subject_id,
            username = %record.username,
            role = %record.role,
            "bootstrap admin created"
        );
        Ok(Some(record))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError("credential store lock poisoned".into()))?;
        Ok(inner
            .by_username
            .get(username)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_auth::{Argon2PasswordHasher, HashCost};

    fn store_with(n: usize) -> InMemoryCredentialStore {
        let store = InMemoryCredentialStore::new();
        for i in 0..n {
            store
                .create(&format!("user{i}"), format!("hash{i}"), Role::new("user"))
                .unwrap();
        }
        store
    }

    #[test]
    fn create_then_get() {
        let store = InMemoryCredentialStore::new();
        let created = store.create("alice", "h".into(), Role::new("user")).unwrap();
        assert_eq!(store.get(created.subject_id).unwrap(), created);
        assert_eq!(store.get(SubjectId::new()), Err(DomainError::NotFound));
    }

    #[test]
    fn duplicate_username_conflicts() {
        let store = InMemoryCredentialStore::new();
        store.create("alice", "h".into(), Role::new("user")).unwrap();
        assert!(matches!(
            store.create("alice", "h2".into(), Role::new("admin")),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn blank_username_or_role_is_invalid() {
        let store = InMemoryCredentialStore::new();
        assert!(matches!(
            store.create("   ", "h".into(), Role::new("user")),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            store.create("bob", "h".into(), Role::new("")),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn list_pages_in_creation_order() {
        let store = store_with(25);

        let (first, total) = store.list(1, 10);
        assert_eq!(total, 25);
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].username, "user0");

        let (last, _) = store.list(3, 10);
        assert_eq!(last.len(), 5);
        assert_eq!(last[4].username, "user24");

        let (beyond, total) = store.list(4, 10);
        assert!(beyond.is_empty());
        assert_eq!(total, 25);
    }

    #[test]
    fn update_changes_only_given_fields() {
        let store = InMemoryCredentialStore::new();
        let created = store.create("alice", "old".into(), Role::new("user")).unwrap();

        let updated = store.update(created.subject_id, None, Some(Role::new("auditor"))).unwrap();
        assert_eq!(updated.password_hash, "old");
        assert_eq!(updated.role, Role::new("auditor"));

        let updated = store.update(created.subject_id, Some("new".into()), None).unwrap();
        assert_eq!(updated.password_hash, "new");
        assert_eq!(updated.role, Role::new("auditor"));

        assert_eq!(store.update(SubjectId::new(), None, None), Err(DomainError::NotFound));
    }

    #[tokio::test]
    async fn delete_frees_the_username() {
        let store = store_with(3);
        let victim = store.find_by_username("user1").await.unwrap().unwrap();

        store.delete(victim.subject_id).unwrap();
        assert!(store.find_by_username("user1").await.unwrap().is_none());
        assert_eq!(store.list(1, 10).1, 2);
        assert_eq!(store.delete(victim.subject_id), Err(DomainError::NotFound));

        store.create("user1", "again".into(), Role::new("user")).unwrap();
    }

    #[tokio::test]
    async fn lookup_by_username() {
        let store = store_with(3);
        let found = store.find_by_username("user1").await.unwrap().unwrap();
        assert_eq!(found.password_hash, "hash1");
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[test]
    fn seed_admin_runs_once() {
        let store = InMemoryCredentialStore::new();
        let hasher = Argon2PasswordHasher::new(HashCost::minimal()).unwrap();

        let created = store
            .seed_admin(&hasher, "admin", "change-me", Role::new("admin"))
            .unwrap()
            .unwrap();
        assert!(hasher.verify("change-me", &created.password_hash).unwrap());

        let again = store
            .seed_admin(&hasher, "root", "other", Role::new("admin"))
            .unwrap();
        assert!(again.is_none());
        assert_eq!(store.list(1, 10).1, 1);
    }
}
