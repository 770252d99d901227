//! Core configuration, injected at construction.
//!
//! Secret material (envelope key, provider client secrets) lives here and is
//! never read from ambient global state by the components themselves.

use secrecy::{ExposeSecret, SecretBox};

use crate::federation::provider::ProviderConfig;
use crate::password::WorkFactor;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_STATE_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

pub struct AuthConfig {
    envelope_key: SecretBox<[u8; 32]>,
    session_ttl_seconds: i64,
    session_sliding_expiry: bool,
    state_ttl_seconds: u64,
    http_timeout_seconds: u64,
    work_factor: WorkFactor,
    providers: Vec<ProviderConfig>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(envelope_key: [u8; 32]) -> Self {
        Self {
            envelope_key: SecretBox::new(Box::new(envelope_key)),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_sliding_expiry: false,
            state_ttl_seconds: DEFAULT_STATE_TTL_SECONDS,
            http_timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECONDS,
            work_factor: WorkFactor::default(),
            providers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    /// Extend a session's expiry on every successful resolve. Off by default.
    #[must_use]
    pub fn with_sliding_expiry(mut self, enabled: bool) -> Self {
        self.session_sliding_expiry = enabled;
        self
    }

    /// TTL for the federation correlation value between redirect and callback.
    #[must_use]
    pub fn with_state_ttl_seconds(mut self, seconds: u64) -> Self {
        self.state_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_http_timeout_seconds(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_work_factor(mut self, work_factor: WorkFactor) -> Self {
        self.work_factor = work_factor;
        self
    }

    /// Registers an identity provider. One entry per provider kind; a later
    /// registration for the same kind wins.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.retain(|p| p.kind != provider.kind);
        self.providers.push(provider);
        self
    }

    pub(crate) fn envelope_key(&self) -> &[u8; 32] {
        self.envelope_key.expose_secret()
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_sliding_expiry(&self) -> bool {
        self.session_sliding_expiry
    }

    #[must_use]
    pub fn state_ttl_seconds(&self) -> u64 {
        self.state_ttl_seconds
    }

    #[must_use]
    pub fn http_timeout_seconds(&self) -> u64 {
        self.http_timeout_seconds
    }

    #[must_use]
    pub fn work_factor(&self) -> WorkFactor {
        self.work_factor
    }

    pub(crate) fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }
}
