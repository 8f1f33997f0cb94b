//! Authoritative session endpoints.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::error::AuthError;
use crate::session::Session;

/// The authoritative source of truth for sessions.
#[async_trait]
pub trait SessionEndpoint: Send + Sync {
    /// Confirm or renew `current`.
    ///
    /// Returns the raw session payload, or `None` when the server holds no
    /// session. Payload validation is left to the caller.
    async fn get_session(
        &self,
        current: Option<&Session>,
    ) -> Result<Option<serde_json::Value>, AuthError>;

    /// Revoke `current` on the server.
    async fn sign_out(&self, current: Option<&Session>) -> Result<(), AuthError>;
}

/// GoTrue-compatible HTTP endpoint (`/auth/v1`)
pub struct GoTrueEndpoint {
    url: String,
    key: String,
    http_client: Client,
}

impl GoTrueEndpoint {
    pub fn new(url: &str, key: &str, http_client: Client) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
        }
    }

    async fn api_error(response: reqwest::Response) -> AuthError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        AuthError::ApiError { status, message }
    }
}

#[async_trait]
impl SessionEndpoint for GoTrueEndpoint {
    async fn get_session(
        &self,
        current: Option<&Session>,
    ) -> Result<Option<serde_json::Value>, AuthError> {
        let Some(session) = current else {
            debug!("No session to refresh");
            return Ok(None);
        };

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.url);

        let payload = serde_json::json!({
            "refresh_token": session.refresh_token,
        });

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body = response.json::<serde_json::Value>().await?;
        Ok(Some(body))
    }

    async fn sign_out(&self, current: Option<&Session>) -> Result<(), AuthError> {
        let session = current.ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/logout", self.url);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Ok(())
    }
}
