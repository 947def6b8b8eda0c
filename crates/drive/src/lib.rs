//! # `anyread-drive`: Google Drive Readers
//!
//! Public files are fetched through Drive's anonymous download link, private
//! ones through the Drive v3 API with the caller's [`AuthorizedSession`]. Both
//! take the file URL (`https://drive.google.com/file/d/{id}/view`) and a format
//! tag, and hand the bytes to the shared decoder.

use anyread::{
    config::Endpoints, core_access::AuthorizedSession, extract_resource_id, fetch::download,
    DecodeOptions, Decoded, ReadError, SourceKind,
};
use reqwest::Client;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default)]
pub struct DriveReader {
    http: Client,
    endpoints: Endpoints,
}

impl DriveReader {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            http: Client::new(),
            endpoints,
        }
    }

    pub fn with_client(http: Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    /// Downloads a publicly shared Drive file (`csv`, `xlsx` or `json`).
    #[instrument(skip(self, options))]
    pub async fn read_public_drive_file(
        &self,
        url: &str,
        format: &str,
        options: &DecodeOptions,
    ) -> Result<Decoded, ReadError> {
        let source = SourceKind::PublicDrive;
        let format = source.parse_format(format)?;
        let file_id = extract_resource_id(url)?;

        let base = self.endpoints.drive_download_base.trim_end_matches('/');
        let request = self
            .http
            .get(format!("{base}/uc"))
            .query(&[("export", "download"), ("id", file_id)]);
        let payload = download(request).await?;
        info!("Downloaded public Drive file {file_id} ({} bytes)", payload.len());

        source.decode(&payload, format, options)
    }

    /// Downloads a private Drive file (`csv`, `xlsx`, `parquet`, `json` or
    /// `txt`) with the caller's session.
    #[instrument(skip(self, session, options))]
    pub async fn read_private_drive_file(
        &self,
        url: &str,
        format: &str,
        session: &AuthorizedSession,
        options: &DecodeOptions,
    ) -> Result<Decoded, ReadError> {
        let source = SourceKind::PrivateDrive;
        let format = source.parse_format(format)?;
        let file_id = extract_resource_id(url)?;

        let base = self.endpoints.drive_api_base.trim_end_matches('/');
        let request = self
            .http
            .get(format!("{base}/drive/v3/files/{file_id}"))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
        let payload = download(session.authorize(request).await?).await?;
        info!("Downloaded private Drive file {file_id} ({} bytes)", payload.len());

        source.decode(&payload, format, options)
    }
}

/// [`DriveReader::read_public_drive_file`] against the default Google endpoints.
pub async fn read_public_drive_file(
    url: &str,
    format: &str,
    options: &DecodeOptions,
) -> Result<Decoded, ReadError> {
    DriveReader::default()
        .read_public_drive_file(url, format, options)
        .await
}

/// [`DriveReader::read_private_drive_file`] against the default Google endpoints.
pub async fn read_private_drive_file(
    url: &str,
    format: &str,
    session: &AuthorizedSession,
    options: &DecodeOptions,
) -> Result<Decoded, ReadError> {
    DriveReader::default()
        .read_private_drive_file(url, format, session, options)
        .await
}
