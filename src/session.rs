//! Session issuance, resolution, and destruction.
//!
//! Tokens are 32 random bytes, base64url-encoded, handed to the client once.
//! Only the SHA-256 digest of a token is retained, so a copy of session state
//! never yields usable tokens. All state sits behind one mutex; issuing,
//! resolving, and destroying a token are each atomic, and a token is always
//! either valid or absent, never in between.

use std::collections::HashMap;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

const TOKEN_BYTES: usize = 32;

/// What the manager remembers about one authenticated principal. Minimal by
/// contract: the principal id and timestamps, never the account itself.
#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub principal_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionManager {
    ttl: Duration,
    sliding_expiry: bool,
    sessions: Mutex<HashMap<Vec<u8>, SessionRecord>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(ttl_seconds: i64, sliding_expiry: bool) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds),
            sliding_expiry,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a new session for `principal_id` and returns the raw token.
    /// The raw value exists only in the return value; storage keeps a digest.
    pub async fn create(&self, principal_id: Uuid) -> String {
        let token = generate_token();
        let now = Utc::now();
        let record = SessionRecord {
            principal_id,
            created_at: now,
            expires_at: now + self.ttl,
        };
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(hash_token(&token), record);
        token
    }

    /// Resolves a token to its principal, or `None` for unknown, destroyed,
    /// or expired tokens. Expired entries are dropped on sight; an expired
    /// session is indistinguishable from no session.
    pub async fn resolve(&self, token: &str) -> Option<Uuid> {
        let digest = hash_token(token);
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let record = sessions.get_mut(&digest)?;
        if record.expires_at <= now {
            sessions.remove(&digest);
            return None;
        }
        if self.sliding_expiry {
            record.expires_at = now + self.ttl;
        }
        Some(record.principal_id)
    }

    /// Invalidates a token immediately. Idempotent: destroying an unknown or
    /// already-destroyed token is not an error.
    pub async fn destroy(&self, token: &str) {
        let digest = hash_token(token);
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&digest);
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
