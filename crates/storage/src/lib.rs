//! # `anyread-storage`: Google Cloud Storage Reader
//!
//! Reads one object from a bucket through the Cloud Storage JSON API with a
//! service-account key. JSON objects are decoded as MongoDB extended JSON,
//! since that is what exports to buckets usually are.

use anyread::{
    config::Endpoints,
    core_access::{AuthorizedSession, DEVSTORAGE_READ_ONLY},
    fetch::download,
    DecodeError, DecodeOptions, Decoded, ReadError, SourceKind,
};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, instrument};

/// The subset of bucket metadata the reader looks at.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub project_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StorageReader {
    http: Client,
    endpoints: Endpoints,
}

impl StorageReader {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            http: Client::new(),
            endpoints,
        }
    }

    pub fn with_client(http: Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    /// Reads `name` from `bucket` (`csv`, `parquet`, `json` or `txt`) with the
    /// service-account key at `credentials_path`.
    #[instrument(
        skip(self, credentials_path, options),
        fields(project = project.unwrap_or_default())
    )]
    pub async fn read_cloud_storage_file(
        &self,
        name: &str,
        format: &str,
        bucket: &str,
        project: Option<&str>,
        credentials_path: impl AsRef<Path>,
        options: &DecodeOptions,
    ) -> Result<Decoded, ReadError> {
        // The tag is checked before the key file is even opened.
        SourceKind::CloudStorage.parse_format(format)?;
        let session = AuthorizedSession::service_account(credentials_path, &[DEVSTORAGE_READ_ONLY])?
            .with_http_client(self.http.clone());
        self.read_with_session(name, format, bucket, &session, options)
            .await
    }

    /// Like [`Self::read_cloud_storage_file`], with a session the caller holds.
    pub async fn read_with_session(
        &self,
        name: &str,
        format: &str,
        bucket: &str,
        session: &AuthorizedSession,
        options: &DecodeOptions,
    ) -> Result<Decoded, ReadError> {
        let source = SourceKind::CloudStorage;
        let format = source.parse_format(format)?;

        let info = self.get_bucket(bucket, session).await?;
        debug!("Resolved bucket {info:?}");

        let mut url = self.bucket_url(bucket)?;
        url.path_segments_mut()
            .map_err(|_| ReadError::InvalidSource(self.endpoints.storage_api_base.clone()))?
            .push("o")
            .push(name);
        let request = self.http.get(url).query(&[("alt", "media")]);
        let payload = download(session.authorize(request).await?).await?;
        info!("Downloaded gs://{bucket}/{name} ({} bytes)", payload.len());

        source.decode(&payload, format, options)
    }

    /// Fetches bucket metadata; a missing bucket is [`ReadError::NotFound`].
    pub async fn get_bucket(
        &self,
        bucket: &str,
        session: &AuthorizedSession,
    ) -> Result<BucketInfo, ReadError> {
        let request = self.http.get(self.bucket_url(bucket)?);
        let body = download(session.authorize(request).await?).await?;
        Ok(serde_json::from_slice(&body).map_err(DecodeError::from)?)
    }

    fn bucket_url(&self, bucket: &str) -> Result<Url, ReadError> {
        let base = self.endpoints.storage_api_base.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/storage/v1/b"))
            .map_err(|e| ReadError::InvalidSource(format!("{base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ReadError::InvalidSource(base.to_string()))?
            .push(bucket);
        Ok(url)
    }
}

/// [`StorageReader::read_cloud_storage_file`] against the default Google endpoints.
pub async fn read_cloud_storage_file(
    name: &str,
    format: &str,
    bucket: &str,
    project: Option<&str>,
    credentials_path: impl AsRef<Path>,
    options: &DecodeOptions,
) -> Result<Decoded, ReadError> {
    StorageReader::default()
        .read_cloud_storage_file(name, format, bucket, project, credentials_path, options)
        .await
}
