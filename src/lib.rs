//! # Confide (credential & session authentication core)
//!
//! `confide` is the authentication core of a minimal content-sharing app: a
//! user proves an identity, the core issues a session, and the session gates
//! access to protected "secret" attributes. Page rendering, routing, and the
//! HTTP server live elsewhere; this crate exposes the operations they call.
//!
//! ## Identity
//!
//! An [`store::models::Account`] authenticates either with a local password
//! (Argon2id, salted, stored only as a PHC string) or through an external
//! OAuth2 provider. Federated linkage is strictly by `(provider, subject_id)`;
//! a matching email never merges accounts, and federated accounts get no
//! fabricated local password.
//!
//! ## Sessions
//!
//! Session tokens are random, opaque, and stored only as digests. Expired,
//! destroyed, and unknown tokens are indistinguishable: all resolve to
//! [`service::Principal::Anonymous`].
//!
//! ## Protected attributes
//!
//! Attributes marked sensitive are sealed with ChaCha20-Poly1305 before they
//! reach storage and opened on read; a tampered or wrongly-keyed envelope
//! fails loudly instead of yielding garbage.
//!
//! Login failures are uniform: the caller learns `BadCredential`, not whether
//! the identifier or the password was wrong.

pub mod config;
pub mod envelope;
pub mod error;
pub mod federation;
pub mod password;
pub mod service;
pub mod session;
pub mod store;

pub use config::AuthConfig;
pub use error::AuthError;
pub use service::{AuthCore, IssuedSession, Principal};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
