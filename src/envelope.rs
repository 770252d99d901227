//! Authenticated encryption for protected account attributes.
//!
//! Attributes marked sensitive never reach storage as plaintext; they are
//! sealed into a [`CiphertextEnvelope`] on write and opened on read. The AAD
//! binds each envelope to its owning account and attribute name, so a valid
//! envelope cannot be replayed onto another account or field.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Identifier recorded in every envelope; bump on scheme changes.
pub const ENVELOPE_ALGORITHM: &str = "chacha20poly1305.v1";

const NONCE_LEN: usize = 12;

/// One sealed attribute: algorithm id, fresh nonce, and ciphertext with the
/// Poly1305 tag appended. This is the only form the attribute takes at rest.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CiphertextEnvelope {
    pub algorithm: String,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Encrypts `plaintext` under the process-wide key with a fresh nonce.
///
/// # Errors
/// Returns an error if the AEAD rejects the input.
pub fn seal(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<CiphertextEnvelope, AuthError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let payload = Payload {
        msg: plaintext,
        aad,
    };
    let ciphertext = cipher
        .encrypt(nonce, payload)
        .map_err(|e| anyhow::anyhow!("envelope seal failure: {e}"))?;

    Ok(CiphertextEnvelope {
        algorithm: ENVELOPE_ALGORITHM.to_string(),
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Decrypts an envelope, verifying the tag and the AAD binding.
///
/// # Errors
/// Returns [`AuthError::IntegrityError`] for a wrong key, wrong AAD, unknown
/// algorithm, or any tampered byte. Never returns altered plaintext.
pub fn open(key: &[u8; 32], envelope: &CiphertextEnvelope, aad: &[u8]) -> Result<Vec<u8>, AuthError> {
    if envelope.algorithm != ENVELOPE_ALGORITHM || envelope.nonce.len() != NONCE_LEN {
        return Err(AuthError::IntegrityError);
    }

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = Nonce::from_slice(&envelope.nonce);

    let payload = Payload {
        msg: &envelope.ciphertext,
        aad,
    };
    cipher
        .decrypt(nonce, payload)
        .map_err(|_| AuthError::IntegrityError)
}

/// AAD for one protected attribute: `attr:v1|account_id|name`.
pub(crate) fn attribute_aad(account_id: Uuid, attribute: &str) -> Vec<u8> {
    format!("attr:v1|{account_id}|{attribute}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [42u8; 32];

    #[test]
    #[allow(clippy::unwrap_used)]
    fn seal_open_roundtrip() {
        let aad = attribute_aad(Uuid::new_v4(), "secret");
        let envelope = seal(&KEY, b"keep this quiet", &aad).unwrap();
        assert_eq!(envelope.algorithm, ENVELOPE_ALGORITHM);
        assert_ne!(envelope.ciphertext, b"keep this quiet");

        let plaintext = open(&KEY, &envelope, &aad).unwrap();
        assert_eq!(plaintext, b"keep this quiet");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn fresh_nonce_per_seal() {
        let aad = attribute_aad(Uuid::nil(), "secret");
        let first = seal(&KEY, b"same plaintext", &aad).unwrap();
        let second = seal(&KEY, b"same plaintext", &aad).unwrap();
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn open_fails_on_tampered_byte() {
        let aad = attribute_aad(Uuid::nil(), "secret");
        let mut envelope = seal(&KEY, b"payload", &aad).unwrap();
        if let Some(byte) = envelope.ciphertext.first_mut() {
            *byte ^= 0x01;
        }
        let result = open(&KEY, &envelope, &aad);
        assert!(matches!(result, Err(AuthError::IntegrityError)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn open_fails_with_wrong_key() {
        let aad = attribute_aad(Uuid::nil(), "secret");
        let envelope = seal(&KEY, b"payload", &aad).unwrap();
        let wrong_key = [7u8; 32];
        let result = open(&wrong_key, &envelope, &aad);
        assert!(matches!(result, Err(AuthError::IntegrityError)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn open_fails_when_bound_to_other_attribute() {
        let account_id = Uuid::new_v4();
        let envelope = seal(&KEY, b"payload", &attribute_aad(account_id, "secret")).unwrap();
        let result = open(&KEY, &envelope, &attribute_aad(account_id, "other"));
        assert!(matches!(result, Err(AuthError::IntegrityError)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn open_rejects_unknown_algorithm() {
        let aad = attribute_aad(Uuid::nil(), "secret");
        let mut envelope = seal(&KEY, b"payload", &aad).unwrap();
        envelope.algorithm = "rot13.v0".to_string();
        let result = open(&KEY, &envelope, &aad);
        assert!(matches!(result, Err(AuthError::IntegrityError)));
    }
}
