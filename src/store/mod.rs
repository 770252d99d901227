//! Credential store: account lookups, atomic find-or-create, and transparent
//! sealing of protected attributes.
//!
//! The store composes its collaborators explicitly: the document store
//! underneath enforces uniqueness, the envelope module seals and opens marked
//! attributes on every write and read. Nothing here fires implicitly on save.

pub mod document;
pub mod models;

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::envelope;
use crate::error::AuthError;

use document::{DocumentStore, StoreError};
use models::{Account, AccountRecord, ExternalIdentity, ProfileHints};

/// Normalize a local identifier for lookup and uniqueness checks.
pub(crate) fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// Basic shape check on an already-normalized identifier: non-empty, no
/// whitespace, bounded length. Email or plain username both pass.
pub(crate) fn valid_identifier(normalized: &str) -> bool {
    Regex::new(r"^\S{1,255}$").is_ok_and(|regex| regex.is_match(normalized))
}

pub struct CredentialStore<S> {
    documents: S,
    config: Arc<AuthConfig>,
}

impl<S: DocumentStore> CredentialStore<S> {
    pub fn new(documents: S, config: Arc<AuthConfig>) -> Self {
        Self { documents, config }
    }

    /// Creates a local-password account.
    ///
    /// # Errors
    /// `InvalidIdentifier` for a malformed identifier, `DuplicateIdentity`
    /// when it is already registered, `StorageUnavailable` on backend faults.
    pub async fn create_local(
        &self,
        identifier: &str,
        hashed_credential: String,
    ) -> Result<Account, AuthError> {
        let normalized = normalize_identifier(identifier);
        if !valid_identifier(&normalized) {
            return Err(AuthError::InvalidIdentifier);
        }
        let account = Account::local(normalized, hashed_credential);
        let record = self.to_record(&account)?;
        self.documents
            .insert_local(record)
            .await
            .map_err(map_conflict_to_duplicate)?;
        Ok(account)
    }

    /// Looks up an account by its normalized local identifier.
    ///
    /// # Errors
    /// `IntegrityError` when a protected attribute fails to open;
    /// `StorageUnavailable` on backend faults.
    pub async fn find_by_local_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Account>, AuthError> {
        let normalized = normalize_identifier(identifier);
        let record = self
            .documents
            .get_by_local(&normalized)
            .await
            .map_err(map_unavailable)?;
        record.map(|record| self.from_record(record)).transpose()
    }

    /// Looks up an account by id.
    ///
    /// # Errors
    /// Same failure surface as [`Self::find_by_local_identifier`].
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AuthError> {
        let record = self
            .documents
            .get_by_id(id)
            .await
            .map_err(map_unavailable)?;
        record.map(|record| self.from_record(record)).transpose()
    }

    /// Returns the account linked to `(provider, subject_id)`, creating it
    /// atomically when absent. Concurrent callbacks for the same pair
    /// converge on a single account; no fabricated local password, no
    /// linkage by email.
    ///
    /// # Errors
    /// `StorageUnavailable` on backend faults, `IntegrityError` if an
    /// existing record fails to open.
    pub async fn find_or_create_by_external_identity(
        &self,
        provider: &str,
        subject_id: &str,
        hints: &ProfileHints,
    ) -> Result<Account, AuthError> {
        let identity = ExternalIdentity {
            provider: provider.to_string(),
            subject_id: subject_id.to_string(),
        };
        let candidate = Account::external(identity, hints);
        let record = self.to_record(&candidate)?;
        let stored = self
            .documents
            .insert_or_get_external(provider, subject_id, record)
            .await
            .map_err(map_unavailable)?;
        self.from_record(stored)
    }

    /// Persists attribute mutations, sealing every protected attribute.
    ///
    /// # Errors
    /// `StorageUnavailable` on backend faults, `DuplicateIdentity` if the
    /// write would violate a unique index.
    pub async fn save(&self, account: &Account) -> Result<(), AuthError> {
        let record = self.to_record(account)?;
        self.documents
            .put(record)
            .await
            .map_err(map_conflict_to_duplicate)
    }

    fn to_record(&self, account: &Account) -> Result<AccountRecord, AuthError> {
        let key = self.config.envelope_key();
        let mut protected = HashMap::with_capacity(account.protected_attributes.len());
        for (name, plaintext) in &account.protected_attributes {
            let aad = envelope::attribute_aad(account.id, name);
            let sealed = envelope::seal(key, plaintext.as_bytes(), &aad)?;
            protected.insert(name.clone(), sealed);
        }
        Ok(AccountRecord {
            id: account.id,
            local_identifier: account.local_identifier.clone(),
            password_credential: account.password_credential.clone(),
            external_identities: account.external_identities.clone(),
            protected_attributes: protected,
            created_at: account.created_at,
            display_name: account.display_name.clone(),
        })
    }

    fn from_record(&self, record: AccountRecord) -> Result<Account, AuthError> {
        let key = self.config.envelope_key();
        let mut protected = HashMap::with_capacity(record.protected_attributes.len());
        for (name, sealed) in &record.protected_attributes {
            let aad = envelope::attribute_aad(record.id, name);
            let plaintext = envelope::open(key, sealed, &aad).map_err(|err| {
                error!(account_id = %record.id, attribute = %name, "failed to open protected attribute");
                err
            })?;
            let plaintext = String::from_utf8(plaintext)
                .map_err(|_| AuthError::IntegrityError)?;
            protected.insert(name.clone(), plaintext);
        }
        Ok(Account {
            id: record.id,
            local_identifier: record.local_identifier,
            password_credential: record.password_credential,
            external_identities: record.external_identities,
            protected_attributes: protected,
            created_at: record.created_at,
            display_name: record.display_name,
        })
    }
}

fn map_conflict_to_duplicate(err: StoreError) -> AuthError {
    match err {
        StoreError::Conflict => AuthError::DuplicateIdentity,
        StoreError::Unavailable(detail) => {
            error!("document store unavailable: {detail}");
            AuthError::StorageUnavailable
        }
    }
}

fn map_unavailable(err: StoreError) -> AuthError {
    match err {
        // Reads and conditional gets have no user-correctable conflict.
        StoreError::Conflict => AuthError::StorageUnavailable,
        StoreError::Unavailable(detail) => {
            error!("document store unavailable: {detail}");
            AuthError::StorageUnavailable
        }
    }
}
