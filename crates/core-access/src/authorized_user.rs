use crate::{AccessToken, AuthError, TokenSource, default_token_uri, request_token};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

/// Stored OAuth 2.0 user credentials.
///
/// Accepts both the `authorized_user` layout written by `gcloud auth
/// application-default login` and the oauth2client layout saved by interactive
/// Drive logins, which additionally carries the last `access_token` and its
/// `token_expiry`.
#[derive(Deserialize, Clone)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_expiry: Option<DateTime<Utc>>,
}

impl AuthorizedUser {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let content = fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            AuthError::InvalidCredentials(format!("malformed authorized user credentials: {e}"))
        })
    }

    /// The stored access token, if it is still usable.
    fn cached_token(&self) -> Option<AccessToken> {
        let token = AccessToken::new(self.access_token.clone()?, Some(self.token_expiry?));
        (!token.is_expired()).then_some(token)
    }
}

impl fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for AuthorizedUser {
    /// Scopes were fixed when the user granted consent, so they are not re-sent.
    #[instrument(skip_all, fields(client_id = %self.client_id))]
    async fn fetch_token(
        &self,
        http: &Client,
        _scopes: &[String],
    ) -> Result<AccessToken, AuthError> {
        if let Some(token) = self.cached_token() {
            debug!("Using stored access token.");
            return Ok(token);
        }
        debug!("Refreshing user access token at {}", self.token_uri);
        let request = http.post(&self.token_uri).form(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
        ]);
        request_token(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyread_test_utils::{CredentialFiles, TEST_ACCESS_TOKEN, mock_token_endpoint, token_uri};
    use chrono::Duration;
    use httpmock::MockServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_refreshes_with_refresh_token() -> anyhow::Result<()> {
        let server = MockServer::start();
        let token_mock = mock_token_endpoint(&server);

        let files = CredentialFiles::new()?;
        let user = AuthorizedUser::from_file(files.authorized_user(&token_uri(&server))?)?;
        let token = user.fetch_token(&Client::new(), &[]).await?;

        token_mock.assert();
        assert_eq!(token.secret(), TEST_ACCESS_TOKEN);
        Ok(())
    }

    #[tokio::test]
    async fn test_unexpired_stored_token_skips_refresh() -> anyhow::Result<()> {
        let server = MockServer::start();
        let token_mock = mock_token_endpoint(&server);

        let files = CredentialFiles::new()?;
        let stored = json!({
            "client_id": "id",
            "client_secret": "secret",
            "refresh_token": "refresh",
            "token_uri": token_uri(&server),
            "access_token": "stored-token",
            "token_expiry": (Utc::now() + Duration::hours(1)).to_rfc3339(),
        });
        let path = files.write("credentials.json", &stored.to_string())?;

        let user = AuthorizedUser::from_file(path)?;
        let token = user.fetch_token(&Client::new(), &[]).await?;

        assert_eq!(token.secret(), "stored-token");
        token_mock.assert_hits(0);
        Ok(())
    }

    #[test]
    fn test_missing_refresh_token_is_invalid() -> anyhow::Result<()> {
        let files = CredentialFiles::new()?;
        let path = files.write("credentials.json", r#"{"client_id": "id"}"#)?;
        let err = AuthorizedUser::from_file(path).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        Ok(())
    }
}
