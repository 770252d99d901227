//! Account records, in-memory (decrypted) and at-rest (sealed) forms.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::CiphertextEnvelope;

/// One provider-issued identity linked to an account.
/// The `(provider, subject_id)` pair is unique across all accounts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider: String,
    pub subject_id: String,
}

/// Optional profile fields asserted by a provider at first login.
/// Display hints only; never used for account linkage.
#[derive(Clone, Debug, Default)]
pub struct ProfileHints {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// The durable identity record, as handled inside the core.
///
/// Protected attributes are plaintext here; they only ever exist sealed in
/// the [`AccountRecord`] form that reaches storage. An account always has at
/// least one authentication means, enforced by the two constructors.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    pub local_identifier: Option<String>,
    pub(crate) password_credential: Option<String>,
    pub external_identities: Vec<ExternalIdentity>,
    pub protected_attributes: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub display_name: Option<String>,
}

impl Account {
    /// A local-password account. `hashed_credential` is a PHC string; the
    /// core never passes plaintext passwords this far.
    pub(crate) fn local(identifier: String, hashed_credential: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            local_identifier: Some(identifier),
            password_credential: Some(hashed_credential),
            external_identities: Vec::new(),
            protected_attributes: HashMap::new(),
            created_at: Utc::now(),
            display_name: None,
        }
    }

    /// A federated account. No local password is fabricated for it.
    pub(crate) fn external(identity: ExternalIdentity, hints: &ProfileHints) -> Self {
        Self {
            id: Uuid::new_v4(),
            local_identifier: None,
            password_credential: None,
            external_identities: vec![identity],
            protected_attributes: HashMap::new(),
            created_at: Utc::now(),
            display_name: hints.display_name.clone(),
        }
    }
}

/// The at-rest form: identical to [`Account`] except protected attributes
/// are ciphertext envelopes. This is what the document store persists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: Uuid,
    pub local_identifier: Option<String>,
    pub password_credential: Option<String>,
    pub external_identities: Vec<ExternalIdentity>,
    pub protected_attributes: HashMap<String, CiphertextEnvelope>,
    pub created_at: DateTime<Utc>,
    pub display_name: Option<String>,
}
