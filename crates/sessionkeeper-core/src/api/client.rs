//! HTTP token authenticator.
//!
//! `HttpAuthenticator` exchanges a credential set for a bearer token using the
//! OAuth2 password grant. It is the `Authenticator` the CLI plugs into a
//! `SessionHolder`; anything else that speaks the same form can reuse it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AuthError;
use crate::auth::{Authenticator, Credentials};

/// HTTP request timeout in seconds.
/// 30s allows for slow identity providers while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Session handle produced by `HttpAuthenticator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSession {
    pub access_token: String,
    pub token_type: String,
    pub identifier: String,
    pub issued_at: DateTime<Utc>,
    /// Lifetime in seconds as reported by the server, if it said anything.
    pub expires_in: Option<i64>,
}

impl TokenSession {
    fn from_response(response: TokenResponse, identifier: &str, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response
                .token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            identifier: identifier.to_string(),
            issued_at,
            expires_in: response.expires_in,
        }
    }

    /// Value for an `Authorization` header
    pub fn bearer(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// `None` when the server gave no lifetime or one that does not fit a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
    }

    /// Whether the server-side lifetime has run out. The holder's own window
    /// is independent of this; callers may use it to `invalidate` early.
    pub fn server_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|at| now >= at).unwrap_or(false)
    }
}

/// Authenticator for OAuth2 password-grant token endpoints.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpAuthenticator {
    client: Client,
    auth_url: String,
}

impl HttpAuthenticator {
    pub fn new(auth_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            auth_url: auth_url.into(),
        })
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::from_status(status, &body))
        }
    }

    fn parse_token(body: &str, identifier: &str, issued_at: DateTime<Utc>) -> Result<TokenSession, AuthError> {
        let token: TokenResponse = serde_json::from_str(body)
            .map_err(|e| AuthError::InvalidResponse(format!("Failed to parse token response: {}", e)))?;

        if let Some(secs) = token.expires_in {
            let in_range = chrono::Duration::try_seconds(secs)
                .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
                .is_some();
            if secs < 0 || !in_range {
                return Err(AuthError::InvalidResponse(format!(
                    "Token response has out of range expires_in: {}",
                    secs
                )));
            }
        }

        if token.access_token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "Token response contained an empty access_token".to_string(),
            ));
        }

        Ok(TokenSession::from_response(token, identifier, issued_at))
    }
}

impl Authenticator for HttpAuthenticator {
    type Session = TokenSession;
    type Error = AuthError;

    async fn login(&self, credentials: &Credentials) -> Result<TokenSession, AuthError> {
        let mut form = vec![
            ("grant_type", "password"),
            ("username", credentials.identifier()),
            ("password", credentials.secret()),
        ];
        if let Some(private_key) = credentials.private_key() {
            form.push(("client_assertion", private_key));
        }

        debug!(url = %self.auth_url, identifier = credentials.identifier(), "Requesting token");

        let response = self
            .client
            .post(&self.auth_url)
            .header(header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = response.text().await?;

        Self::parse_token(&body, credentials.identifier(), Utc::now())
    }
}

// ============================================================================
// Tests
// ============================================================================
