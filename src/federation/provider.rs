//! Identity providers: a closed set of kinds, their OAuth2 endpoints, and
//! the code-for-identity exchange.
//!
//! The exchange sits behind [`TokenExchanger`] so callback handling can be
//! exercised without network access; the production implementation speaks
//! HTTP via `reqwest` with a bounded timeout.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, error, instrument};

/// The providers this core knows how to talk to. Selection is explicit;
/// there is no dynamic strategy lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Google,
    Github,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth2 client registration for one provider.
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub client_id: String,
    pub client_secret: SecretString,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
}

impl ProviderConfig {
    #[must_use]
    pub fn google(client_id: String, client_secret: SecretString, redirect_uri: String) -> Self {
        Self {
            kind: ProviderKind::Google,
            client_id,
            client_secret,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            redirect_uri,
        }
    }

    #[must_use]
    pub fn github(client_id: String, client_secret: SecretString, redirect_uri: String) -> Self {
        Self {
            kind: ProviderKind::Github,
            client_id,
            client_secret,
            authorize_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            userinfo_url: "https://api.github.com/user".to_string(),
            scopes: vec!["read:user".to_string(), "user:email".to_string()],
            redirect_uri,
        }
    }
}

/// The identity a provider asserts after a successful code exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssertedIdentity {
    pub subject_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Exchanges an authorization code for the provider's asserted identity.
pub trait TokenExchanger: Send + Sync {
    fn resolve_identity(
        &self,
        provider: &ProviderConfig,
        code: &str,
    ) -> impl std::future::Future<Output = Result<AssertedIdentity>> + Send;
}

/// Production exchanger: code -> access token -> userinfo, over HTTPS with a
/// bounded timeout so a stalled provider surfaces as an error, not a hang.
pub struct HttpTokenExchanger {
    client: Client,
}

impl HttpTokenExchanger {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("failed to build federation http client")?;
        Ok(Self { client })
    }
}

impl TokenExchanger for HttpTokenExchanger {
    #[instrument(skip_all, fields(provider = %provider.kind))]
    async fn resolve_identity(
        &self,
        provider: &ProviderConfig,
        code: &str,
    ) -> Result<AssertedIdentity> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", provider.client_id.as_str()),
            ("client_secret", provider.client_secret.expose_secret()),
            ("redirect_uri", provider.redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(&provider.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .context("token endpoint unreachable")?;

        if !response.status().is_success() {
            let status = response.status();
            error!(provider = %provider.kind, %status, "token exchange rejected");
            return Err(anyhow!("token endpoint returned {status}"));
        }

        let token_response: Value = response
            .json()
            .await
            .context("malformed token response")?;
        let access_token = get_required_str(&token_response, &["access_token"])
            .ok_or_else(|| anyhow!("token response missing access_token"))?;

        let response = self
            .client
            .get(&provider.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("userinfo endpoint unreachable")?;

        if !response.status().is_success() {
            let status = response.status();
            error!(provider = %provider.kind, %status, "userinfo request rejected");
            return Err(anyhow!("userinfo endpoint returned {status}"));
        }

        let profile: Value = response.json().await.context("malformed userinfo response")?;
        let identity = asserted_identity_from_profile(&profile)
            .ok_or_else(|| anyhow!("userinfo response missing subject id"))?;
        debug!(provider = %provider.kind, "resolved external identity");
        Ok(identity)
    }
}

/// Pulls the subject id and display hints out of a userinfo document.
/// OIDC providers use `sub`; GitHub returns a numeric `id`.
fn asserted_identity_from_profile(profile: &Value) -> Option<AssertedIdentity> {
    let subject_id = get_required_str(profile, &["sub"])
        .map(str::to_string)
        .or_else(|| {
            profile.get("id").and_then(|id| {
                id.as_str()
                    .map(str::to_string)
                    .or_else(|| id.as_i64().map(|n| n.to_string()))
            })
        })?;
    Some(AssertedIdentity {
        subject_id,
        email: get_required_str(profile, &["email"]).map(str::to_string),
        display_name: get_required_str(profile, &["name"]).map(str::to_string),
    })
}

fn get_required_str<'a>(json: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = json;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_kind_names() {
        assert_eq!(ProviderKind::Google.as_str(), "google");
        assert_eq!(ProviderKind::Github.as_str(), "github");
    }

    #[test]
    fn google_config_uses_oidc_endpoints() {
        let config = ProviderConfig::google(
            "client".to_string(),
            SecretString::from("secret".to_string()),
            "https://app.example/callback/google".to_string(),
        );
        assert!(config.authorize_url.starts_with("https://accounts.google.com"));
        assert!(config.scopes.contains(&"openid".to_string()));
    }

    #[test]
    fn identity_prefers_oidc_sub() {
        let profile = json!({"sub": "abc", "id": 42, "email": "a@x.com", "name": "Ada"});
        let identity = asserted_identity_from_profile(&profile).expect("identity");
        assert_eq!(identity.subject_id, "abc");
        assert_eq!(identity.email.as_deref(), Some("a@x.com"));
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn identity_falls_back_to_numeric_id() {
        let profile = json!({"id": 42, "login": "ada"});
        let identity = asserted_identity_from_profile(&profile).expect("identity");
        assert_eq!(identity.subject_id, "42");
    }

    #[test]
    fn identity_requires_a_subject() {
        let profile = json!({"email": "a@x.com"});
        assert!(asserted_identity_from_profile(&profile).is_none());
    }
}
