//! The persistence seam the credential store sits on.
//!
//! The contract is small: get by key, upsert, and conditional inserts that
//! enforce the two unique indexes (`local_identifier` and each
//! `(provider, subject_id)` pair) with no check-then-insert window. A
//! concurrent in-memory implementation is provided for embedding and tests;
//! a database-backed implementation maps `Conflict` from its unique-violation
//! error and `Unavailable` from transient faults.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::AccountRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("unique index conflict")]
    Conflict,
    /// Transient backend fault; the caller may retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub trait DocumentStore: Send + Sync {
    /// Inserts a record whose `local_identifier` must be free.
    /// Fails with [`StoreError::Conflict`] when the identifier is taken.
    fn insert_local(
        &self,
        record: AccountRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Insert-if-absent keyed on `(provider, subject_id)`.
    ///
    /// Returns the already-linked record when one exists, otherwise inserts
    /// `candidate` and returns it. Atomic: two concurrent calls for the same
    /// pair converge on a single record.
    fn insert_or_get_external(
        &self,
        provider: &str,
        subject_id: &str,
        candidate: AccountRecord,
    ) -> impl std::future::Future<Output = Result<AccountRecord, StoreError>> + Send;

    fn get_by_id(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<AccountRecord>, StoreError>> + Send;

    fn get_by_local(
        &self,
        identifier: &str,
    ) -> impl std::future::Future<Output = Result<Option<AccountRecord>, StoreError>> + Send;

    /// Upserts by id, refreshing secondary indexes.
    fn put(
        &self,
        record: AccountRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Default)]
struct Indexes {
    accounts: HashMap<Uuid, AccountRecord>,
    by_local: HashMap<String, Uuid>,
    by_external: HashMap<(String, String), Uuid>,
}

/// In-memory [`DocumentStore`]. A single `RwLock` over the record map and
/// both indexes makes every uniqueness check atomic with its insert.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Indexes>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    async fn insert_local(&self, record: AccountRecord) -> Result<(), StoreError> {
        let Some(identifier) = record.local_identifier.clone() else {
            return Err(StoreError::Conflict);
        };
        let mut inner = self.inner.write().await;
        if inner.by_local.contains_key(&identifier) {
            return Err(StoreError::Conflict);
        }
        inner.by_local.insert(identifier, record.id);
        inner.accounts.insert(record.id, record);
        Ok(())
    }

    async fn insert_or_get_external(
        &self,
        provider: &str,
        subject_id: &str,
        candidate: AccountRecord,
    ) -> Result<AccountRecord, StoreError> {
        let key = (provider.to_string(), subject_id.to_string());
        let mut inner = self.inner.write().await;
        if let Some(existing_id) = inner.by_external.get(&key).copied() {
            return inner
                .accounts
                .get(&existing_id)
                .cloned()
                .ok_or_else(|| StoreError::Unavailable("dangling external index".to_string()));
        }
        inner.by_external.insert(key, candidate.id);
        inner.accounts.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AccountRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn get_by_local(&self, identifier: &str) -> Result<Option<AccountRecord>, StoreError> {
        let inner = self.inner.read().await;
        let Some(id) = inner.by_local.get(identifier).copied() else {
            return Ok(None);
        };
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn put(&self, record: AccountRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(identifier) = &record.local_identifier {
            if inner
                .by_local
                .get(identifier)
                .is_some_and(|owner| *owner != record.id)
            {
                return Err(StoreError::Conflict);
            }
        }
        for identity in &record.external_identities {
            let key = (identity.provider.clone(), identity.subject_id.clone());
            if inner
                .by_external
                .get(&key)
                .is_some_and(|owner| *owner != record.id)
            {
                return Err(StoreError::Conflict);
            }
        }

        // Drop index entries this record no longer claims before re-indexing,
        // so a cleared identifier stops resolving.
        inner.by_local.retain(|identifier, owner| {
            *owner != record.id || record.local_identifier.as_deref() == Some(identifier.as_str())
        });
        inner.by_external.retain(|(provider, subject_id), owner| {
            *owner != record.id
                || record.external_identities.iter().any(|identity| {
                    identity.provider == *provider && identity.subject_id == *subject_id
                })
        });

        if let Some(identifier) = &record.local_identifier {
            inner.by_local.insert(identifier.clone(), record.id);
        }
        for identity in &record.external_identities {
            inner.by_external.insert(
                (identity.provider.clone(), identity.subject_id.clone()),
                record.id,
            );
        }
        inner.accounts.insert(record.id, record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::ExternalIdentity;
    use std::sync::Arc;

    fn local_record(identifier: &str) -> AccountRecord {
        AccountRecord {
            id: Uuid::new_v4(),
            local_identifier: Some(identifier.to_string()),
            password_credential: Some("$argon2id$...".to_string()),
            external_identities: Vec::new(),
            protected_attributes: HashMap::new(),
            created_at: chrono::Utc::now(),
            display_name: None,
        }
    }

    fn external_record(provider: &str, subject_id: &str) -> AccountRecord {
        AccountRecord {
            id: Uuid::new_v4(),
            local_identifier: None,
            password_credential: None,
            external_identities: vec![ExternalIdentity {
                provider: provider.to_string(),
                subject_id: subject_id.to_string(),
            }],
            protected_attributes: HashMap::new(),
            created_at: chrono::Utc::now(),
            display_name: None,
        }
    }

    #[tokio::test]
    async fn insert_local_enforces_identifier_uniqueness() {
        let store = MemoryStore::new();
        store
            .insert_local(local_record("a@x.com"))
            .await
            .expect("first insert");
        let second = store.insert_local(local_record("a@x.com")).await;
        assert!(matches!(second, Err(StoreError::Conflict)));

        let found = store.get_by_local("a@x.com").await.expect("lookup");
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn insert_or_get_external_returns_existing() {
        let store = MemoryStore::new();
        let first = store
            .insert_or_get_external("google", "123", external_record("google", "123"))
            .await
            .expect("insert");
        let second = store
            .insert_or_get_external("google", "123", external_record("google", "123"))
            .await
            .expect("get");
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn concurrent_find_or_create_converges_on_one_record() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert_or_get_external("google", "123", external_record("google", "123"))
                    .await
                    .expect("insert-or-get")
                    .id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.expect("task"));
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "all racers must resolve to the same account");
    }

    #[tokio::test]
    async fn put_rejects_stealing_another_accounts_identifier() {
        let store = MemoryStore::new();
        store
            .insert_local(local_record("a@x.com"))
            .await
            .expect("insert");

        let mut thief = local_record("b@x.com");
        store.insert_local(thief.clone()).await.expect("insert");
        thief.local_identifier = Some("a@x.com".to_string());
        let result = store.put(thief).await;
        assert!(matches!(result, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn put_reindexes_a_changed_identifier() {
        let store = MemoryStore::new();
        let mut record = local_record("a@x.com");
        store.insert_local(record.clone()).await.expect("insert");

        record.local_identifier = Some("b@x.com".to_string());
        store.put(record.clone()).await.expect("put");

        let stale = store.get_by_local("a@x.com").await.expect("lookup");
        assert!(stale.is_none(), "old identifier must stop resolving");
        let fresh = store.get_by_local("b@x.com").await.expect("lookup");
        assert_eq!(fresh.map(|r| r.id), Some(record.id));
    }

    #[tokio::test]
    async fn put_drops_index_entries_for_removed_external_identity() {
        let store = MemoryStore::new();
        let mut record = external_record("google", "123");
        store
            .insert_or_get_external("google", "123", record.clone())
            .await
            .expect("insert");

        record.external_identities.clear();
        record.local_identifier = Some("a@x.com".to_string());
        store.put(record.clone()).await.expect("put");

        // The freed pair is claimable by a new account again.
        let other = store
            .insert_or_get_external("google", "123", external_record("google", "123"))
            .await
            .expect("insert");
        assert_ne!(other.id, record.id);
    }

    #[tokio::test]
    async fn put_updates_record_in_place() {
        let store = MemoryStore::new();
        let mut record = local_record("a@x.com");
        store.insert_local(record.clone()).await.expect("insert");

        record.display_name = Some("Ada".to_string());
        store.put(record.clone()).await.expect("put");

        let found = store
            .get_by_id(record.id)
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(found.display_name.as_deref(), Some("Ada"));
    }
}
