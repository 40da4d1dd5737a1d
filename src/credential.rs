//! Short-lived bearer credentials for the signaling endpoint.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use secrecy::SecretString;

use crate::consts::EPHEMERAL_TOKEN_PATH;
use crate::error::{Result, SessionError};

/// An ephemeral token. The expiry is carried along for callers but never
/// checked here.
#[derive(Debug, Clone)]
pub struct Credential {
    token: SecretString,
    expires_at: Option<String>,
}

impl Credential {
    pub fn new(token: &str, expires_at: Option<String>) -> Self {
        Self {
            token: SecretString::from(token.to_string()),
            expires_at,
        }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn expires_at(&self) -> Option<&str> {
        self.expires_at.as_deref()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetches a fresh credential. Fails with `TokenUnavailable`.
    async fn fetch(&self) -> Result<Credential>;
}

#[derive(Debug, serde::Deserialize)]
struct TokenEnvelope {
    result: Option<TokenResult>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResult {
    token: Option<String>,
    expires_at: Option<String>,
}

/// Asks the Sulten backend to mint an ephemeral realtime token.
pub struct HttpCredentialProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpCredentialProvider {
    pub fn new(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", api_url.trim_end_matches('/'), EPHEMERAL_TOKEN_PATH),
        }
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn fetch(&self) -> Result<Credential> {
        let response = self.client.post(&self.url).send().await.map_err(|e| {
            tracing::warn!("ephemeral token request failed: {}", e);
            SessionError::TokenUnavailable
        })?;
        if !response.status().is_success() {
            tracing::warn!("ephemeral token request returned {}", response.status());
            return Err(SessionError::TokenUnavailable);
        }
        let envelope: TokenEnvelope = response.json().await.map_err(|e| {
            tracing::warn!("ephemeral token response unreadable: {}", e);
            SessionError::TokenUnavailable
        })?;
        parse_envelope(envelope)
    }
}

fn parse_envelope(envelope: TokenEnvelope) -> Result<Credential> {
    let result = envelope.result.ok_or(SessionError::TokenUnavailable)?;
    match result.token {
        Some(token) if !token.is_empty() => Ok(Credential::new(&token, result.expires_at)),
        _ => Err(SessionError::TokenUnavailable),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn envelope_yields_token_and_expiry() {
        let envelope: TokenEnvelope =
            serde_json::from_str(r#"{"result":{"token":"ek_123","expiresAt":"2026-10-14T12:00:00Z"}}"#).unwrap();
        let credential = parse_envelope(envelope).unwrap();
        assert_eq!(credential.token().expose_secret(), "ek_123");
        assert_eq!(credential.expires_at(), Some("2026-10-14T12:00:00Z"));
    }

    #[test]
    fn missing_or_empty_token_is_unavailable() {
        let envelope: TokenEnvelope = serde_json::from_str(r#"{"result":{"token":""}}"#).unwrap();
        assert_eq!(parse_envelope(envelope).unwrap_err(), SessionError::TokenUnavailable);
        let envelope: TokenEnvelope = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(parse_envelope(envelope).unwrap_err(), SessionError::TokenUnavailable);
    }

    #[test]
    fn url_joins_api_base() {
        let provider = HttpCredentialProvider::new(reqwest::Client::new(), "http://localhost:8080/");
        assert_eq!(provider.url, "http://localhost:8080/api/openai/agent/ephemeral-token");
    }
}
