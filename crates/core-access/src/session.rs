use crate::{AccessToken, AuthError, AuthorizedUser, ServiceAccountKey, StaticToken, TokenSource};
use reqwest::{Client, RequestBuilder};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// An authenticated handle to Google APIs.
///
/// Callers build one session and pass it by reference to every reader that
/// needs it. The session keeps the most recent access token and only goes back
/// to its [`TokenSource`] once that token is about to expire. Clones share the
/// token slot.
#[derive(Clone)]
pub struct AuthorizedSession {
    http: Client,
    source: Arc<dyn TokenSource>,
    scopes: Arc<[String]>,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl AuthorizedSession {
    pub fn with_source(source: impl TokenSource + 'static, scopes: &[&str]) -> Self {
        Self {
            http: Client::new(),
            source: Arc::new(source),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// Loads a service-account key file and requests tokens for `scopes`.
    pub fn service_account(path: impl AsRef<Path>, scopes: &[&str]) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let key = ServiceAccountKey::from_file(path)?;
        info!(
            "Loaded service account '{}' from {}",
            key.client_email,
            path.display()
        );
        Ok(Self::with_source(key, scopes))
    }

    /// Loads stored OAuth user credentials.
    pub fn authorized_user(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let user = AuthorizedUser::from_file(path)?;
        Ok(Self::with_source(user, &[]))
    }

    /// Wraps an access token obtained elsewhere.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::with_source(StaticToken(token.into()), &[])
    }

    /// Replaces the HTTP client used for token requests.
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Returns a bearer token, minting a new one if none is held or it expired.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.secret().to_string());
        }
        let token = self.source.fetch_token(&self.http, &self.scopes).await?;
        let secret = token.secret().to_string();
        *slot = Some(token);
        Ok(secret)
    }

    /// Attaches the bearer token to `request`.
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, AuthError> {
        Ok(request.bearer_auth(self.access_token().await?))
    }
}

impl fmt::Debug for AuthorizedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedSession")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
