use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use secrecy::ExposeSecret;

use crate::consts::{AUTHORIZATION_HEADER, CONTENT_TYPE_SDP};
use crate::credential::Credential;
use crate::error::{Result, SessionError};

/// Offer/answer exchange with the realtime endpoint.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Signaling: Send + Sync {
    /// Posts the local offer and returns the remote answer SDP.
    async fn exchange(&self, offer_sdp: String, credential: &Credential) -> Result<String>;
}

pub struct HttpSignaling {
    client: reqwest::Client,
    url: String,
}

impl HttpSignaling {
    pub fn new(client: reqwest::Client, endpoint: &str, model: &str) -> Self {
        Self {
            client,
            url: format!("{}?model={}", endpoint.trim_end_matches('/'), model),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Signaling for HttpSignaling {
    async fn exchange(&self, offer_sdp: String, credential: &Credential) -> Result<String> {
        tracing::debug!("posting SDP offer to {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION_HEADER, format!("Bearer {}", credential.token().expose_secret()))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_SDP)
            .body(offer_sdp)
            .send()
            .await
            .map_err(|e| SessionError::Negotiation(format!("SDP exchange failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SessionError::Negotiation(format!("failed to read SDP answer: {}", e)))?;
        if !status.is_success() {
            tracing::error!("SDP exchange returned {}: {}", status, body);
            return Err(SessionError::Negotiation(format!("SDP exchange returned {}", status)));
        }
        if body.trim().is_empty() {
            return Err(SessionError::Negotiation("empty SDP answer".to_string()));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_is_a_query_parameter() {
        let signaling = HttpSignaling::new(
            reqwest::Client::new(),
            "https://api.openai.com/v1/realtime",
            "gpt-4o-mini-realtime-preview-2024-12-17",
        );
        assert_eq!(
            signaling.url(),
            "https://api.openai.com/v1/realtime?model=gpt-4o-mini-realtime-preview-2024-12-17"
        );
    }
}
