//! # Core Access Crate
//!
//! This crate is the central authority for obtaining Google API credentials in
//! `anyread`. Readers only ever see an [`AuthorizedSession`]; how the bearer
//! token behind it is minted (service-account JWT, stored OAuth user grant, or a
//! token handed in by the caller) stays in here.

mod authorized_user;
mod service_account;
mod session;

pub use authorized_user::AuthorizedUser;
pub use service_account::{AssertionClaims, ServiceAccountKey};
pub use session::AuthorizedSession;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

pub const SHEETS_READONLY: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
pub const DRIVE_READONLY: &str = "https://www.googleapis.com/auth/drive.readonly";
pub const DEVSTORAGE_READ_ONLY: &str = "https://www.googleapis.com/auth/devstorage.read_only";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to read credentials file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Token request failed: {0}")]
    TokenRequest(#[from] reqwest::Error),
    #[error("Token endpoint rejected the grant with status {status}: {body}")]
    TokenRejected { status: u16, body: String },
}

/// A bearer token and the instant it stops being valid.
///
/// `expires_at` is `None` for tokens supplied by the caller, which are used
/// as-is until the API rejects them.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn expiring_in(secret: impl Into<String>, seconds: i64) -> Self {
        Self::new(secret, Some(Utc::now() + Duration::seconds(seconds)))
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_SKEW_SECS) <= now,
            None => false,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Anything that can mint an [`AccessToken`] for a set of OAuth scopes.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self, http: &Client, scopes: &[String])
    -> Result<AccessToken, AuthError>;
}

/// A token supplied directly by the caller.
#[derive(Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn fetch_token(
        &self,
        _http: &Client,
        _scopes: &[String],
    ) -> Result<AccessToken, AuthError> {
        Ok(AccessToken::new(self.0.clone(), None))
    }
}

/// The body Google's OAuth token endpoint returns for every grant type.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Sends a token grant and turns the response into an [`AccessToken`].
pub(crate) async fn request_token(request: RequestBuilder) -> Result<AccessToken, AuthError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::TokenRejected {
            status: status.as_u16(),
            body,
        });
    }
    let token: TokenResponse = response.json().await?;
    Ok(AccessToken::expiring_in(
        token.access_token,
        token.expires_in.unwrap_or(3600),
    ))
}

pub(crate) fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry_uses_skew() {
        let now = Utc::now();
        let token = AccessToken::new("t", Some(now + Duration::seconds(30)));
        assert!(token.is_expired_at(now), "30s left is inside the skew window");

        let token = AccessToken::new("t", Some(now + Duration::seconds(600)));
        assert!(!token.is_expired_at(now));
    }

    #[test]
    fn test_static_token_never_expires() {
        let token = AccessToken::new("t", None);
        assert!(!token.is_expired_at(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let token = AccessToken::expiring_in("super-secret", 3600);
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
