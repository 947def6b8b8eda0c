use crate::{AccessToken, AuthError, TokenSource, default_token_uri, request_token};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// A Google service-account JSON key, as downloaded from the Cloud console.
#[derive(Deserialize, Clone)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// Claims of the self-signed assertion exchanged for an access token.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, AuthError> {
        let key: ServiceAccountKey = serde_json::from_str(content).map_err(|e| {
            AuthError::InvalidCredentials(format!("malformed service account key: {e}"))
        })?;
        match key.key_type.as_deref() {
            None | Some("service_account") => Ok(key),
            Some(other) => Err(AuthError::InvalidCredentials(format!(
                "expected a service_account key, found '{other}'"
            ))),
        }
    }

    /// Builds and signs the RS256 JWT assertion for `scopes`.
    pub fn build_assertion(
        &self,
        scopes: &[String],
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: scopes.join(" "),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(encode(&header, &claims, &key)?)
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for ServiceAccountKey {
    #[instrument(skip(self, http), fields(client_email = %self.client_email))]
    async fn fetch_token(
        &self,
        http: &Client,
        scopes: &[String],
    ) -> Result<AccessToken, AuthError> {
        let assertion = self.build_assertion(scopes, Utc::now())?;
        debug!("Exchanging service account assertion at {}", self.token_uri);
        let request = http.post(&self.token_uri).form(&[
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ]);
        request_token(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEVSTORAGE_READ_ONLY;
    use anyread_test_utils::{
        CredentialFiles, TEST_ACCESS_TOKEN, TEST_CLIENT_EMAIL, TEST_RSA_PUBLIC_KEY, token_uri,
    };
    use httpmock::{Method, MockServer};
    use jsonwebtoken::{DecodingKey, Validation, decode};

    #[test]
    fn test_assertion_verifies_with_public_key() -> anyhow::Result<()> {
        let files = CredentialFiles::new()?;
        let path = files.service_account("https://oauth2.example.test/token")?;
        let key = ServiceAccountKey::from_file(&path)?;

        let scopes = vec![DEVSTORAGE_READ_ONLY.to_string()];
        let jwt = key.build_assertion(&scopes, Utc::now())?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["https://oauth2.example.test/token"]);
        let decoded = decode::<AssertionClaims>(
            &jwt,
            &DecodingKey::from_rsa_pem(TEST_RSA_PUBLIC_KEY.as_bytes())?,
            &validation,
        )?;

        assert_eq!(decoded.header.kid.as_deref(), Some("test-key-id"));
        assert_eq!(decoded.claims.iss, TEST_CLIENT_EMAIL);
        assert_eq!(decoded.claims.scope, DEVSTORAGE_READ_ONLY);
        assert_eq!(decoded.claims.exp - decoded.claims.iat, ASSERTION_LIFETIME_SECS);
        Ok(())
    }

    #[test]
    fn test_rejects_other_credential_types() {
        let err = ServiceAccountKey::from_json(
            r#"{"type": "authorized_user", "private_key": "x", "client_email": "y"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ServiceAccountKey::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, AuthError::Io(_)));
    }

    #[tokio::test]
    async fn test_fetch_token_exchanges_assertion() -> anyhow::Result<()> {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(Method::POST)
                .path("/token")
                .body_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer")
                .body_contains("assertion=");
            then.status(200).json_body(serde_json::json!({
                "access_token": TEST_ACCESS_TOKEN,
                "expires_in": 3599,
                "token_type": "Bearer"
            }));
        });

        let files = CredentialFiles::new()?;
        let key = ServiceAccountKey::from_file(files.service_account(&token_uri(&server))?)?;
        let token = key
            .fetch_token(&Client::new(), &[DEVSTORAGE_READ_ONLY.to_string()])
            .await?;

        token_mock.assert();
        assert_eq!(token.secret(), TEST_ACCESS_TOKEN);
        assert!(!token.is_expired());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_grant_surfaces_status() -> anyhow::Result<()> {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(Method::POST).path("/token");
            then.status(400).body(r#"{"error": "invalid_grant"}"#);
        });

        let files = CredentialFiles::new()?;
        let key = ServiceAccountKey::from_file(files.service_account(&token_uri(&server))?)?;
        let err = key.fetch_token(&Client::new(), &[]).await.unwrap_err();

        match err {
            AuthError::TokenRejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }
}
