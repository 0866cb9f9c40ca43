//! Token management
//!
//! Clusters accept the OAuth2 password grant for their public `fly` client.
//! The username and password come from the configured cluster URL.

use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use std::fmt;
use tracing::{debug, info};

use broadcaster_core::dto::auth::TokenResponse;

use crate::ClusterClient;
use crate::error::{ClientError, Result};

const TOKEN_PATH: &str = "sky/issuer/token";
const CLIENT_ID: &str = "fly";
const CLIENT_SECRET: &str = "Zmx5";
const SCOPES: &str = "openid profile email federated:id groups";

/// Tokens are treated as expired this long before their actual expiry.
const EXPIRY_LEEWAY_SECS: i64 = 10;

/// Username and password taken from a cluster URL
#[derive(Clone, Default)]
pub(crate) struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_url(url: &Url) -> Self {
        Self {
            username: decode_userinfo(url.username()),
            password: url.password().map(decode_userinfo).unwrap_or_default(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Bearer token with its optional expiry
#[derive(Clone)]
pub(crate) struct AccessToken {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            value: response.access_token,
            expires_at: response
                .expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| now + Duration::seconds(secs)),
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if self.value.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expiry) => now + Duration::seconds(EXPIRY_LEEWAY_SECS) < expiry,
            None => true,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl ClusterClient {
    // =============================================================================
    // Authentication
    // =============================================================================

    /// Return a valid access token, running the password grant if needed
    ///
    /// Concurrent callers share one grant: the token slot stays locked while
    /// a new token is fetched.
    pub async fn refresh_token(&self) -> Result<String> {
        let mut slot = self.token.lock().await;

        if let Some(token) = slot.as_ref()
            && token.is_valid(Utc::now())
        {
            return Ok(token.value.clone());
        }

        let token = self.password_grant().await?;
        let value = token.value.clone();
        *slot = Some(token);

        Ok(value)
    }

    async fn password_grant(&self) -> Result<AccessToken> {
        if self.credentials.username.is_empty() {
            return Err(ClientError::Authentication(format!(
                "no username configured for {}",
                self.url
            )));
        }

        let url = self.endpoint(&TOKEN_PATH.split('/').collect::<Vec<_>>())?;
        debug!(cluster = %self.url, "requesting access token");

        let form = [
            ("grant_type", "password"),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
            ("scope", SCOPES),
        ];

        let response = self
            .client
            .post(url)
            .basic_auth(CLIENT_ID, Some(CLIENT_SECRET))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Authentication(format!(
                "token request to {} returned {}: {}",
                self.url,
                status.as_u16(),
                body.trim()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse token response: {}", e)))?;

        info!(cluster = %self.url, "obtained new access token");
        Ok(AccessToken::from_response(body, Utc::now()))
    }
}

/// Decode `%XX` escapes as found in URL userinfo. Invalid UTF-8 is kept raw.
fn decode_userinfo(input: &str) -> String {
    urlencoding::decode(input).map_or_else(|_| input.to_string(), |decoded| decoded.into_owned())
}
