//! Error taxonomy for the authentication core.
//!
//! Every operation returns one of these as an explicit outcome; the routing
//! layer owns the user-facing copy, this crate only classifies.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Registration conflict: the local identifier is already taken.
    #[error("identity already registered")]
    DuplicateIdentity,
    /// The supplied identifier is not acceptable as a local identifier.
    #[error("invalid identifier")]
    InvalidIdentifier,
    /// Wrong identifier or wrong password. Deliberately does not say which.
    #[error("invalid credentials")]
    BadCredential,
    /// No account with the requested id.
    #[error("account not found")]
    NotFound,
    /// The user declined at the provider, or the provider rejected the attempt.
    #[error("identity provider denied the request")]
    FederationDenied,
    /// Provider unreachable or its response was malformed. Retryable.
    #[error("identity provider exchange failed: {0}")]
    FederationError(String),
    /// Envelope decryption failed: wrong key or tampered ciphertext.
    /// Fatal for that record; there is no plaintext fallback.
    #[error("protected attribute failed integrity check")]
    IntegrityError,
    /// Transient storage fault; callers may retry with backoff.
    #[error("storage unavailable")]
    StorageUnavailable,
    /// The request carried no valid session.
    #[error("not authenticated")]
    Unauthenticated,
    /// Unexpected internal failure (crypto primitive, runtime).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::AuthError;

    #[test]
    fn bad_credential_message_is_uniform() {
        // One message for both failure causes so account existence never leaks.
        assert_eq!(AuthError::BadCredential.to_string(), "invalid credentials");
    }

    #[test]
    fn integrity_error_names_no_plaintext() {
        let message = AuthError::IntegrityError.to_string();
        assert!(message.contains("integrity"));
    }
}
