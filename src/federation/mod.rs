//! OAuth2 authorization-code flow against external identity providers.
//!
//! One attempt walks: redirect out with a fresh correlation value, callback
//! in with a code or a denial, code exchange, then account linkage by the
//! `(provider, subject_id)` pair. The correlation value is unguessable,
//! single-use, and expires, which is what stands between the callback and a
//! forged cross-site request.

pub mod provider;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::config::AuthConfig;
use crate::error::AuthError;

use provider::{AssertedIdentity, ProviderConfig, ProviderKind, TokenExchanger};

const STATE_BYTES: usize = 32;

/// Where to send the user agent to start an attempt.
#[derive(Clone, Debug)]
pub struct RedirectTarget {
    pub url: Url,
    /// The correlation value embedded in `url`, exposed so the routing layer
    /// can also pin it in a short-lived cookie if it wants to.
    pub state: String,
}

/// Query parameters the provider sends to the callback endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

struct PendingAttempt {
    kind: ProviderKind,
    created_at: Instant,
}

pub struct FederationHandler<X> {
    config: Arc<AuthConfig>,
    exchanger: X,
    state_ttl: Duration,
    pending: Mutex<HashMap<String, PendingAttempt>>,
}

impl<X: TokenExchanger> FederationHandler<X> {
    pub fn new(config: Arc<AuthConfig>, exchanger: X) -> Self {
        let state_ttl = Duration::from_secs(config.state_ttl_seconds());
        Self {
            config,
            exchanger,
            state_ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Starts an attempt: records a fresh correlation value and builds the
    /// provider authorize URL for the user agent to follow.
    ///
    /// # Errors
    /// `FederationError` when the provider is not configured or its
    /// authorize URL does not parse.
    pub async fn begin(&self, kind: ProviderKind) -> Result<RedirectTarget, AuthError> {
        let provider = self.provider(kind)?;
        let state = generate_state();

        {
            let mut pending = self.pending.lock().await;
            let ttl = self.state_ttl;
            pending.retain(|_, attempt| attempt.created_at.elapsed() < ttl);
            pending.insert(
                state.clone(),
                PendingAttempt {
                    kind,
                    created_at: Instant::now(),
                },
            );
        }

        let mut url = Url::parse(&provider.authorize_url)
            .map_err(|e| AuthError::FederationError(format!("bad authorize url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &provider.client_id)
            .append_pair("redirect_uri", &provider.redirect_uri)
            .append_pair("scope", &provider.scopes.join(" "))
            .append_pair("state", &state);

        Ok(RedirectTarget { url, state })
    }

    /// Handles the provider callback: validates and consumes the correlation
    /// value, then exchanges the code for the asserted identity.
    ///
    /// # Errors
    /// `FederationDenied` for a missing/unknown/expired state, a provider
    /// `error` parameter, or a missing code; `FederationError` when the
    /// exchange itself fails.
    pub async fn complete(
        &self,
        params: &CallbackParams,
    ) -> Result<(ProviderKind, AssertedIdentity), AuthError> {
        let Some(state) = params.state.as_deref() else {
            return Err(AuthError::FederationDenied);
        };
        // Single use: the state is removed whether or not the rest succeeds.
        let attempt = {
            let mut pending = self.pending.lock().await;
            pending.remove(state)
        };
        let Some(attempt) = attempt else {
            return Err(AuthError::FederationDenied);
        };
        if attempt.created_at.elapsed() >= self.state_ttl {
            return Err(AuthError::FederationDenied);
        }

        if let Some(denial) = params.error.as_deref() {
            debug!(provider = %attempt.kind, denial, "provider reported a denial");
            return Err(AuthError::FederationDenied);
        }
        let Some(code) = params.code.as_deref() else {
            return Err(AuthError::FederationDenied);
        };

        let provider = self.provider(attempt.kind)?;
        let identity = self
            .exchanger
            .resolve_identity(provider, code)
            .await
            .map_err(|err| AuthError::FederationError(format!("{err:#}")))?;

        Ok((attempt.kind, identity))
    }

    fn provider(&self, kind: ProviderKind) -> Result<&ProviderConfig, AuthError> {
        self.config
            .providers()
            .iter()
            .find(|provider| provider.kind == kind)
            .ok_or_else(|| {
                AuthError::FederationError(format!("provider {kind} is not configured"))
            })
    }
}

fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}
