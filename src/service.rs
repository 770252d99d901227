//! The entry points the routing layer calls.
//!
//! Each operation is a small pipeline of explicit steps: resolve the claimed
//! identity, check the credential, issue or consult a session. Every outcome
//! is a value from the error taxonomy; nothing here renders pages or touches
//! transport concerns.
//!
//! Login policy: an unknown identifier and a wrong password both come back
//! as `BadCredential`, and the unknown-identifier path still burns a hash
//! verification, so neither the message nor the timing reveals whether an
//! account exists.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::federation::provider::{HttpTokenExchanger, ProviderKind, TokenExchanger};
use crate::federation::{CallbackParams, FederationHandler, RedirectTarget};
use crate::password;
use crate::session::SessionManager;
use crate::store::document::{DocumentStore, MemoryStore};
use crate::store::models::{Account, ProfileHints};
use crate::store::CredentialStore;

/// A syntactically valid PHC string whose digest matches nothing. Verified
/// against when the identifier is unknown so both login failure paths cost
/// one argon2 run.
const DUMMY_CREDENTIAL: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$MDEyMzQ1Njc4OWFiY2RlZg$MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY";

/// What a successful authentication hands back to the routing layer:
/// the raw token for the client and the principal it proves. Never the
/// password credential, never the full account.
#[derive(Clone, Debug)]
pub struct IssuedSession {
    pub token: String,
    pub principal_id: Uuid,
}

/// The resolution of a session token.
#[derive(Clone, Debug)]
pub enum Principal {
    Account(Account),
    Anonymous,
}

pub struct AuthCore<S, X> {
    config: Arc<AuthConfig>,
    store: CredentialStore<S>,
    sessions: SessionManager,
    federation: FederationHandler<X>,
}

impl AuthCore<MemoryStore, HttpTokenExchanger> {
    /// Core with the in-memory document store and the HTTP exchanger.
    ///
    /// # Errors
    /// Returns an error if the federation HTTP client cannot be built.
    pub fn in_memory(config: AuthConfig) -> Result<Self, AuthError> {
        let exchanger = HttpTokenExchanger::new(config.http_timeout_seconds())?;
        Ok(Self::new(config, MemoryStore::new(), exchanger))
    }
}

impl<S: DocumentStore, X: TokenExchanger> AuthCore<S, X> {
    pub fn new(config: AuthConfig, documents: S, exchanger: X) -> Self {
        let config = Arc::new(config);
        let store = CredentialStore::new(documents, Arc::clone(&config));
        let sessions = SessionManager::new(
            config.session_ttl_seconds(),
            config.session_sliding_expiry(),
        );
        let federation = FederationHandler::new(Arc::clone(&config), exchanger);
        Self {
            config,
            store,
            sessions,
            federation,
        }
    }

    /// Registers a local-password account.
    ///
    /// # Errors
    /// `InvalidIdentifier`, `DuplicateIdentity`, or `StorageUnavailable`.
    pub async fn register_local(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Account, AuthError> {
        let hashed = self.hash_password(password.to_string()).await?;
        let account = self.store.create_local(identifier, hashed).await?;
        debug!(account_id = %account.id, "registered local account");
        Ok(account)
    }

    /// Verifies a local credential pair and issues a session.
    ///
    /// # Errors
    /// `BadCredential` for an unknown identifier, a wrong password, or an
    /// account with no local credential; storage and integrity errors pass
    /// through.
    pub async fn login_local(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<IssuedSession, AuthError> {
        let account = self.store.find_by_local_identifier(identifier).await?;

        let (stored, account) = match account {
            Some(account) => match account.password_credential.clone() {
                Some(stored) => (stored, Some(account)),
                // Federated-only account: no local credential to check.
                None => (DUMMY_CREDENTIAL.to_string(), None),
            },
            None => (DUMMY_CREDENTIAL.to_string(), None),
        };

        let verified = self.verify_password(password.to_string(), stored).await?;
        let Some(account) = account.filter(|_| verified) else {
            return Err(AuthError::BadCredential);
        };

        let token = self.sessions.create(account.id).await;
        Ok(IssuedSession {
            token,
            principal_id: account.id,
        })
    }

    /// Builds the provider redirect that starts a federated login.
    ///
    /// # Errors
    /// `FederationError` when the provider is not configured.
    pub async fn begin_federated_login(
        &self,
        provider: ProviderKind,
    ) -> Result<RedirectTarget, AuthError> {
        self.federation.begin(provider).await
    }

    /// Finishes a federated login from the provider callback: validates the
    /// correlation value, exchanges the code, links or creates the account
    /// by `(provider, subject_id)`, and issues a session.
    ///
    /// # Errors
    /// `FederationDenied`, `FederationError`, or storage errors.
    pub async fn complete_federated_login(
        &self,
        provider: ProviderKind,
        params: &CallbackParams,
    ) -> Result<IssuedSession, AuthError> {
        let (resolved_kind, identity) = self.federation.complete(params).await?;
        if resolved_kind != provider {
            // Callback arrived on a different provider's endpoint than the
            // attempt it correlates to.
            return Err(AuthError::FederationDenied);
        }

        let hints = ProfileHints {
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
        };
        let account = self
            .store
            .find_or_create_by_external_identity(provider.as_str(), &identity.subject_id, &hints)
            .await?;
        debug!(account_id = %account.id, provider = %provider, "federated login linked");

        let token = self.sessions.create(account.id).await;
        Ok(IssuedSession {
            token,
            principal_id: account.id,
        })
    }

    /// Resolves a session token to the account it authenticates. Unknown,
    /// expired, and destroyed tokens are all `Anonymous`.
    ///
    /// # Errors
    /// Storage and integrity errors pass through.
    pub async fn current_principal(&self, token: &str) -> Result<Principal, AuthError> {
        let Some(principal_id) = self.sessions.resolve(token).await else {
            return Ok(Principal::Anonymous);
        };
        match self.store.find_by_id(principal_id).await? {
            Some(account) => Ok(Principal::Account(account)),
            // Session outlived its account; treat as no session.
            None => Ok(Principal::Anonymous),
        }
    }

    /// Invalidates a session. Idempotent.
    pub async fn logout(&self, token: &str) {
        self.sessions.destroy(token).await;
    }

    /// Stores one protected attribute for the authenticated account. The
    /// value is sealed before it reaches storage.
    ///
    /// # Errors
    /// `Unauthenticated` without a valid session, `NotFound` if the account
    /// vanished, storage errors otherwise.
    pub async fn submit_protected_attribute(
        &self,
        token: &str,
        name: &str,
        plaintext: &str,
    ) -> Result<(), AuthError> {
        let Some(principal_id) = self.sessions.resolve(token).await else {
            return Err(AuthError::Unauthenticated);
        };
        let mut account = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        account
            .protected_attributes
            .insert(name.to_string(), plaintext.to_string());
        self.store.save(&account).await
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let work = self.config.work_factor();
        tokio::task::spawn_blocking(move || password::hash(&password, work))
            .await
            .map_err(|e| anyhow::anyhow!("password hashing task failed: {e}"))?
    }

    async fn verify_password(&self, password: String, stored: String) -> Result<bool, AuthError> {
        tokio::task::spawn_blocking(move || password::verify(&password, &stored))
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("password verify task failed: {e}")))
    }
}
